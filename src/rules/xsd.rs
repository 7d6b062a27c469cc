use tracing::debug;

use crate::configurator::CONFIG_FILE_NAME;
use crate::error::{AdxError, Result};
use crate::schema::{SchemaOutcome, SchemaTarget, resolve_schema};
use crate::validator::ValidationContext;

pub(super) async fn validate(ctx: &mut ValidationContext) -> Result<()> {
    let config = ctx.project_dir().join(CONFIG_FILE_NAME);
    let target = SchemaTarget::sniff(&config).await?;
    let schema = resolve_schema(&target, &ctx.schemas_dir, &ctx.bundled_schemas_dir).await?;
    debug!("Linting {} with {}", config.display(), schema.display());

    let outcome = ctx.schema_validator.validate(&schema, &config).await?;
    match outcome {
        SchemaOutcome::Valid => {
            ctx.success("XSD validated");
            Ok(())
        }
        SchemaOutcome::Invalid { errors } => Err(AdxError::SchemaValidation {
            file: config,
            details: errors.join("\n"),
        }),
    }
}
