use super::ActionContext;
use crate::error::{LaunchError, ProviderError};
use crate::provider::{CloudProvider, CreateStackRequest, Progress, StackDescription};
use crate::template::Template;
use crate::types::Outputs;
use std::fmt;

/// Hook that finishes the template at launch, once inputs are known
pub trait TemplateSetup {
    /// Add parameters, resources and outputs that depend on resolved inputs
    fn set_up_stack(&self, template: &mut Template, inputs: &Outputs) -> Result<(), LaunchError>;
}

impl<F> TemplateSetup for F
where
    F: Fn(&mut Template, &Outputs) -> Result<(), LaunchError>,
{
    fn set_up_stack(&self, template: &mut Template, inputs: &Outputs) -> Result<(), LaunchError> {
        self(template, inputs)
    }
}

/// Hook run on the provider's outputs before they are published
pub trait OutputTransform {
    fn transform(&self, outputs: &mut Outputs);
}

impl<F> OutputTransform for F
where
    F: Fn(&mut Outputs),
{
    fn transform(&self, outputs: &mut Outputs) {
        self(outputs);
    }
}

/// A declarative-template node
pub struct TemplateStack {
    template: Template,
    setup: Option<Box<dyn TemplateSetup>>,
    transform: Option<Box<dyn OutputTransform>>,
    rendered: Option<Template>,
    last_seen: Option<StackDescription>,
}

impl fmt::Debug for TemplateStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateStack")
            .field("template", &self.template)
            .field("has_setup", &self.setup.is_some())
            .field("has_transform", &self.transform.is_some())
            .field("rendered", &self.rendered.is_some())
            .field("last_seen", &self.last_seen)
            .finish()
    }
}

impl TemplateStack {
    pub fn new(template: Template) -> Self {
        Self {
            template,
            setup: None,
            transform: None,
            rendered: None,
            last_seen: None,
        }
    }

    #[must_use]
    pub fn with_setup(mut self, setup: impl TemplateSetup + 'static) -> Self {
        self.setup = Some(Box::new(setup));
        self
    }

    #[must_use]
    pub fn with_output_transform(mut self, transform: impl OutputTransform + 'static) -> Self {
        self.transform = Some(Box::new(transform));
        self
    }

    #[must_use]
    pub fn template(&self) -> &Template {
        &self.template
    }

    /// The template as last submitted, setup hook applied
    #[must_use]
    pub fn rendered(&self) -> Option<&Template> {
        self.rendered.as_ref()
    }

    /// Finish the template, resolve its parameters and submit it, unless
    /// a stack with the computed name already exists.
    pub(crate) fn launch(
        &mut self,
        context: &ActionContext,
        provider: &dyn CloudProvider,
    ) -> Result<(), LaunchError> {
        let mut template = self.template.clone();
        if let Some(setup) = &self.setup {
            setup.set_up_stack(&mut template, &context.inputs)?;
        }

        let mut parameters = Vec::new();
        for (parameter, input) in template.input_wiring() {
            match context.inputs.get(input) {
                Some(value) => parameters.push((parameter.clone(), value.render())),
                None => tracing::warn!(
                    stack = %context.stack_name,
                    parameter,
                    input,
                    "input unresolved, leaving parameter to its template default"
                ),
            }
        }

        if let Some(existing) = provider.find_stack(&context.stack_name)? {
            tracing::info!(
                stack = %context.stack_name,
                status = %existing.status,
                "stack already exists, not creating"
            );
        } else {
            provider.create_stack(CreateStackRequest {
                name: context.stack_name.clone(),
                template_body: template.to_json()?,
                parameters,
                tags: context.tags.clone(),
            })?;
            tracing::info!(stack = %context.stack_name, "stack created");
        }

        self.rendered = Some(template);
        Ok(())
    }

    pub(crate) fn check_status(
        &mut self,
        stack_name: &str,
        provider: &dyn CloudProvider,
    ) -> Result<Progress, ProviderError> {
        let description = provider.describe_stack(stack_name)?;
        tracing::debug!(stack = stack_name, status = %description.status, "polled stack");
        let progress = description.status.progress();
        self.last_seen = Some(description);
        Ok(progress)
    }

    pub(crate) fn capture_outputs(&mut self) -> Outputs {
        let mut outputs = self
            .last_seen
            .as_ref()
            .map(|d| d.outputs.clone())
            .unwrap_or_default();
        if let Some(transform) = &self.transform {
            transform.transform(&mut outputs);
        }
        outputs
    }
}
