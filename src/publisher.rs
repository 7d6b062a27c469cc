//! ZenDesk help center publisher
//!
//! Publishing is strictly sequential: the article is located (or created),
//! its old attachments are deleted one at a time, the new files are uploaded
//! one at a time, then the translation body is replaced. The first failure
//! stops the whole operation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::config::PublisherSettings;
use crate::configurator::Configurator;
use crate::error::{AdxError, Result};
use crate::http_client::{AsyncHttpClient, Credentials, HttpClientConfig};
use crate::model::ProjectType;
use crate::template::{DEFAULT_TEMPLATE, TemplateValues, render};
use crate::writer::{PrintMode, Writer, WriterHub};

const API_ROOT: &str = "/api/v2/help_center";
const BIN_DIR: &str = "bin";
const PREVIEW_FILE: &str = "preview.png";

#[derive(Debug, Clone, Deserialize)]
pub struct Section {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Article {
    pub id: u64,
    pub title: String,
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Attachment {
    pub id: u64,
    pub content_url: String,
    pub file_name: Option<String>,
}

#[derive(Deserialize)]
struct ArticleEnvelope {
    article: Article,
}

#[derive(Deserialize)]
struct AttachmentEnvelope {
    article_attachment: Attachment,
}

/// Files uploaded with the article
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishFiles {
    pub package: PathBuf,
    pub qex: Option<PathBuf>,
    pub preview: Option<PathBuf>,
}

impl PublishFiles {
    /// Locate the `bin/*.adc|*.adp` package (required), the `*.qex` example
    /// and `preview.png`
    pub async fn find(project_dir: &Path, project_type: ProjectType) -> Result<Self> {
        let bin = project_dir.join(BIN_DIR);
        let package = first_with_extension(&bin, project_type.as_str())
            .await?
            .ok_or_else(|| AdxError::NotFound {
                path: bin.join(format!("*.{}", project_type.as_str())),
            })?;

        let qex = match first_with_extension(&bin, "qex").await? {
            Some(path) => Some(path),
            None => first_with_extension(project_dir, "qex").await?,
        };

        let preview = project_dir.join(PREVIEW_FILE);
        let preview = tokio::fs::try_exists(&preview)
            .await
            .unwrap_or(false)
            .then_some(preview);

        Ok(Self {
            package,
            qex,
            preview,
        })
    }

    fn in_upload_order(&self) -> impl Iterator<Item = (UploadKind, &Path)> {
        std::iter::once((UploadKind::Package, self.package.as_path()))
            .chain(self.qex.as_deref().map(|path| (UploadKind::Qex, path)))
            .chain(self.preview.as_deref().map(|path| (UploadKind::Preview, path)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UploadKind {
    Package,
    Qex,
    Preview,
}

/// First file (by name) in `dir` with the given extension; a missing dir yields `None`
async fn first_with_extension(dir: &Path, extension: &str) -> Result<Option<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(AdxError::Io(e)),
    };

    let mut found = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if matches && entry.file_type().await?.is_file() {
            found.push(path);
        }
    }
    found.sort();
    Ok(found.into_iter().next())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub article_id: u64,
    pub created: bool,
    pub html_url: Option<String>,
    /// Uploaded file names, in upload order
    pub uploaded: Vec<String>,
}

pub struct ZenDeskPublisher {
    client: AsyncHttpClient,
    settings: PublisherSettings,
    hub: WriterHub,
}

impl ZenDeskPublisher {
    pub fn new(
        settings: &PublisherSettings,
        logger: Option<Arc<dyn Writer>>,
        print_mode: PrintMode,
    ) -> Result<Self> {
        let credentials = match (&settings.token, &settings.password) {
            (Some(token), _) => Some(Credentials::Token {
                username: settings.username.clone(),
                token: token.clone(),
            }),
            (None, Some(password)) => Some(Credentials::Password {
                username: settings.username.clone(),
                password: password.clone(),
            }),
            (None, None) => None,
        };

        let client = AsyncHttpClient::new(HttpClientConfig {
            base_url: settings.url.clone(),
            credentials,
            timeout_seconds: settings.timeout_seconds,
            retry_attempts: settings.retry_attempts,
            retry_delay_ms: settings.retry_delay_ms,
            ..Default::default()
        })?;

        Ok(Self {
            client,
            settings: settings.clone(),
            hub: WriterHub::new(logger, print_mode),
        })
    }

    /// Publish the project; failures are also written through the writer
    pub async fn publish(&self, project_dir: &Path) -> Result<PublishOutcome> {
        match self.run(project_dir).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.hub.error(&err.to_string());
                Err(err)
            }
        }
    }

    async fn run(&self, project_dir: &Path) -> Result<PublishOutcome> {
        let configurator = Configurator::load(project_dir).await?;
        let title = configurator
            .info()
            .name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| AdxError::Rule("Missing or empty `info/name` node".to_string()))?;
        let files = PublishFiles::find(project_dir, configurator.project_type()).await?;
        info!("Publishing `{}` to section `{}`", title, self.settings.section);

        let section = self.find_section(&self.settings.section).await?;
        let (article, created) = self.find_or_create_article(&section, &title).await?;
        if !created {
            self.delete_attachments(article.id).await?;
        }

        let mut values = TemplateValues::new(configurator.info(), configurator.properties());
        values.demo_url = self.settings.demo_url.clone();
        let mut uploaded = Vec::new();
        for (kind, path) in files.in_upload_order() {
            let attachment = self.upload(article.id, path).await?;
            let url = Some(attachment.content_url);
            match kind {
                UploadKind::Package => values.file_url = url,
                UploadKind::Qex => values.qex_file_url = url,
                UploadKind::Preview => values.preview_url = url,
            }
            uploaded.push(file_name(path));
        }

        let template = self.load_template().await?;
        let body = render(&template, &values);
        self.update_translation(article.id, &title, &body).await?;

        self.hub.success(&format!("Article `{}` published", title));
        Ok(PublishOutcome {
            article_id: article.id,
            created,
            html_url: article.html_url,
            uploaded,
        })
    }

    pub async fn find_section(&self, name: &str) -> Result<Section> {
        let sections: Vec<Section> = self
            .client
            .get_paginated(&format!("{}/sections.json", API_ROOT), "sections")
            .await?;
        sections
            .into_iter()
            .find(|section| section.name == name)
            .ok_or_else(|| AdxError::SectionNotFound {
                name: name.to_string(),
            })
    }

    /// Article titled `title` in the section, created when absent
    async fn find_or_create_article(&self, section: &Section, title: &str) -> Result<(Article, bool)> {
        let path = format!("{}/sections/{}/articles.json", API_ROOT, section.id);
        let mut articles: Vec<Article> = self.client.get_paginated(&path, "articles").await?;
        articles.retain(|article| article.title == title);

        match articles.len() {
            0 => {
                let body = json!({
                    "article": {
                        "title": title,
                        "locale": self.settings.locale,
                        "body": "",
                        "promoted": self.settings.promoted,
                        "comments_disabled": self.settings.comments_disabled,
                    }
                });
                let envelope: ArticleEnvelope = self.client.post_json(&path, &body).await?;
                self.hub.message(&format!("Article `{}` created", title));
                Ok((envelope.article, true))
            }
            1 => {
                let article = articles.remove(0);
                self.hub.message(&format!("Updating article `{}` ({})", title, article.id));
                Ok((article, false))
            }
            count => Err(AdxError::DuplicateArticle {
                title: title.to_string(),
                count,
            }),
        }
    }

    async fn delete_attachments(&self, article_id: u64) -> Result<()> {
        let attachments: Vec<Attachment> = self
            .client
            .get_paginated(
                &format!("{}/articles/{}/attachments.json", API_ROOT, article_id),
                "article_attachments",
            )
            .await?;

        for attachment in attachments {
            debug!("Deleting attachment {}", attachment.id);
            self.client
                .delete(&format!("{}/articles/attachments/{}.json", API_ROOT, attachment.id))
                .await?;
            self.hub.message(&format!(
                "Deleted attachment `{}`",
                attachment.file_name.as_deref().unwrap_or("?")
            ));
        }
        Ok(())
    }

    async fn upload(&self, article_id: u64, path: &Path) -> Result<Attachment> {
        let envelope: AttachmentEnvelope = self
            .client
            .upload_file(
                &format!("{}/articles/{}/attachments.json", API_ROOT, article_id),
                path,
            )
            .await?;
        self.hub.message(&format!("Uploaded `{}`", file_name(path)));
        Ok(envelope.article_attachment)
    }

    async fn load_template(&self) -> Result<String> {
        match &self.settings.template {
            Some(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|e| AdxError::from_io(e, path)),
            None => Ok(DEFAULT_TEMPLATE.to_string()),
        }
    }

    async fn update_translation(&self, article_id: u64, title: &str, body: &str) -> Result<()> {
        let path = format!(
            "{}/articles/{}/translations/{}.json",
            API_ROOT, article_id, self.settings.locale
        );
        let _: Value = self
            .client
            .put_json(&path, &json!({ "translation": { "title": title, "body": body } }))
            .await?;
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{RecordingWriter, Severity};
    use mockito::{Matcher, Server, ServerGuard};
    use tempfile::TempDir;

    const CONFIG: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<control version="2.1.0">
  <info>
    <name>Slider</name>
    <constraints>
      <constraint on="questions" single="true" />
    </constraints>
  </info>
</control>"#;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.xml"), CONFIG).unwrap();
        std::fs::create_dir(dir.path().join("bin")).unwrap();
        std::fs::write(dir.path().join("bin").join("Slider.adc"), b"zip").unwrap();
        std::fs::write(dir.path().join("preview.png"), b"png").unwrap();
        dir
    }

    fn publisher(server: &ServerGuard, recorder: &Arc<RecordingWriter>) -> ZenDeskPublisher {
        let settings = PublisherSettings {
            url: server.url(),
            username: "author@example.com".to_string(),
            token: Some("secret".to_string()),
            section: "Controls".to_string(),
            retry_attempts: 0,
            ..Default::default()
        };
        ZenDeskPublisher::new(&settings, Some(recorder.clone()), PrintMode::Default).unwrap()
    }

    async fn mock_sections(server: &mut ServerGuard) {
        server
            .mock("GET", "/api/v2/help_center/sections.json")
            .with_status(200)
            .with_body(r#"{"sections":[{"id":7,"name":"Controls"}],"next_page":null}"#)
            .create_async()
            .await;
    }

    async fn mock_articles(server: &mut ServerGuard, body: &str) {
        server
            .mock("GET", "/api/v2/help_center/sections/7/articles.json")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;
    }

    #[tokio::test]
    async fn test_find_files() {
        let dir = project();
        std::fs::write(dir.path().join("Slider.qex"), b"qex").unwrap();

        let files = PublishFiles::find(dir.path(), ProjectType::Adc).await.unwrap();
        assert_eq!(files.package, dir.path().join("bin").join("Slider.adc"));
        assert_eq!(files.qex, Some(dir.path().join("Slider.qex")));
        assert_eq!(files.preview, Some(dir.path().join("preview.png")));

        let err = PublishFiles::find(dir.path(), ProjectType::Adp).await.unwrap_err();
        assert!(matches!(err, AdxError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_publish_creates_missing_article() {
        let dir = project();
        let mut server = Server::new_async().await;
        mock_sections(&mut server).await;
        mock_articles(&mut server, r#"{"articles":[{"id":1,"title":"Other"}],"next_page":null}"#).await;

        let create = server
            .mock("POST", "/api/v2/help_center/sections/7/articles.json")
            .match_body(Matcher::PartialJson(json!({"article": {"title": "Slider"}})))
            .with_status(201)
            .with_body(r#"{"article":{"id":42,"title":"Slider","html_url":"https://help/42"}}"#)
            .create_async()
            .await;
        let upload = server
            .mock("POST", "/api/v2/help_center/articles/42/attachments.json")
            .with_status(201)
            .with_body(r#"{"article_attachment":{"id":5,"content_url":"https://cdn/file","file_name":"f"}}"#)
            .expect(2)
            .create_async()
            .await;
        let translation = server
            .mock("PUT", "/api/v2/help_center/articles/42/translations/en-us.json")
            .match_body(Matcher::PartialJson(json!({"translation": {"title": "Slider"}})))
            .with_status(200)
            .with_body(r#"{"translation":{"id":9}}"#)
            .create_async()
            .await;

        let recorder = Arc::new(RecordingWriter::new());
        let outcome = publisher(&server, &recorder).publish(dir.path()).await.unwrap();

        assert!(outcome.created);
        assert_eq!(outcome.article_id, 42);
        assert_eq!(outcome.uploaded, vec!["Slider.adc", "preview.png"]);
        assert_eq!(outcome.html_url.as_deref(), Some("https://help/42"));
        create.assert_async().await;
        upload.assert_async().await;
        translation.assert_async().await;
        assert_eq!(recorder.lines(Severity::Success), vec!["Article `Slider` published"]);
    }

    #[tokio::test]
    async fn test_publish_reuses_article_and_deletes_attachments() {
        let dir = project();
        let mut server = Server::new_async().await;
        mock_sections(&mut server).await;
        mock_articles(&mut server, r#"{"articles":[{"id":42,"title":"Slider"}],"next_page":null}"#).await;

        server
            .mock("GET", "/api/v2/help_center/articles/42/attachments.json")
            .with_status(200)
            .with_body(
                r#"{"article_attachments":[
                    {"id":100,"content_url":"https://cdn/a","file_name":"old.adc"},
                    {"id":101,"content_url":"https://cdn/b","file_name":"old.png"}
                ],"next_page":null}"#,
            )
            .create_async()
            .await;
        let delete_first = server
            .mock("DELETE", "/api/v2/help_center/articles/attachments/100.json")
            .with_status(204)
            .create_async()
            .await;
        let delete_second = server
            .mock("DELETE", "/api/v2/help_center/articles/attachments/101.json")
            .with_status(204)
            .create_async()
            .await;
        let create = server
            .mock("POST", "/api/v2/help_center/sections/7/articles.json")
            .expect(0)
            .create_async()
            .await;
        server
            .mock("POST", "/api/v2/help_center/articles/42/attachments.json")
            .with_status(201)
            .with_body(r#"{"article_attachment":{"id":6,"content_url":"https://cdn/new","file_name":"n"}}"#)
            .create_async()
            .await;
        server
            .mock("PUT", "/api/v2/help_center/articles/42/translations/en-us.json")
            .match_body(Matcher::Regex("https://cdn/new".to_string()))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let recorder = Arc::new(RecordingWriter::new());
        let outcome = publisher(&server, &recorder).publish(dir.path()).await.unwrap();

        assert!(!outcome.created);
        delete_first.assert_async().await;
        delete_second.assert_async().await;
        create.assert_async().await;
        assert!(
            recorder
                .lines(Severity::Message)
                .contains(&"Deleted attachment `old.png`".to_string())
        );
    }

    #[tokio::test]
    async fn test_duplicate_articles_abort() {
        let dir = project();
        let mut server = Server::new_async().await;
        mock_sections(&mut server).await;
        mock_articles(
            &mut server,
            r#"{"articles":[{"id":1,"title":"Slider"},{"id":2,"title":"Slider"}],"next_page":null}"#,
        )
        .await;

        let recorder = Arc::new(RecordingWriter::new());
        let err = publisher(&server, &recorder).publish(dir.path()).await.unwrap_err();

        assert!(matches!(err, AdxError::DuplicateArticle { count: 2, .. }));
        assert_eq!(recorder.count(Severity::Error), 1);
    }

    #[tokio::test]
    async fn test_missing_section() {
        let dir = project();
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/v2/help_center/sections.json")
            .with_status(200)
            .with_body(r#"{"sections":[{"id":8,"name":"Pages"}],"next_page":null}"#)
            .create_async()
            .await;

        let recorder = Arc::new(RecordingWriter::new());
        let err = publisher(&server, &recorder).publish(dir.path()).await.unwrap_err();
        assert!(matches!(err, AdxError::SectionNotFound { ref name } if name == "Controls"));
    }
}
