//! Prompt templates exposed by the sample catalog

use crate::registry::{ParamShape, ParameterDescriptor, Prompt};

pub fn prompts() -> Vec<Prompt> {
    vec![Prompt::new("summarize", |args| {
        Ok(format!(
            "Write a short summary of {} in a {} tone.",
            args.str("topic")?,
            args.str("tone")?
        ))
    })
    .describe("Ask for a summary of a topic")
    .param(ParameterDescriptor::new("topic", ParamShape::String).describe("What to summarize"))
    .param(
        ParameterDescriptor::new(
            "tone",
            ParamShape::enumeration(["neutral", "friendly", "formal"]),
        )
        .describe("Voice of the summary")
        .with_default("neutral"),
    )]
}
