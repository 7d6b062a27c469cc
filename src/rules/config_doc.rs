use crate::configurator::Configurator;
use crate::error::Result;
use crate::model::ProjectType;
use crate::validator::{StepId, ValidationContext};

/// Load `config.xml` and drop the steps that do not apply to its project type
pub(super) async fn init(ctx: &mut ValidationContext) -> Result<()> {
    let configurator = Configurator::load(ctx.project_dir()).await?;

    match configurator.project_type() {
        ProjectType::Adc => ctx.remove_upcoming(StepId::ValidateMasterPage),
        ProjectType::Adp => ctx.remove_upcoming(StepId::ValidateAdxInfoConstraints),
    };

    ctx.configurator = Some(configurator);
    Ok(())
}
