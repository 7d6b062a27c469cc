use crate::configurator::CONFIG_FILE_NAME;
use crate::error::{AdxError, Result};
use crate::resources::{DirResources, RESOURCES_DIR, ResourceMode};
use crate::validator::ValidationContext;

/// `config.xml` must exist; the resources inventory is taken for later steps
pub(super) async fn validate(ctx: &mut ValidationContext) -> Result<()> {
    let config = ctx.project_dir().join(CONFIG_FILE_NAME);
    tokio::fs::metadata(&config)
        .await
        .map_err(|e| AdxError::from_io(e, &config))?;

    let resources = DirResources::scan(ctx.project_dir()).await?;
    for mode in ResourceMode::ALL {
        if !resources.get(mode).is_exist {
            ctx.warning(&format!(
                "Missing `{}/{}` directory",
                RESOURCES_DIR,
                mode.dir_name()
            ));
        }
    }
    ctx.dir_resources = Some(resources);

    ctx.success("File structure validated");
    Ok(())
}
