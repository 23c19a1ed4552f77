//! Tools exposed by the sample catalog

use anyhow::bail;

use crate::registry::{ParamShape, ParameterDescriptor, Tool};

pub fn tools() -> Vec<Tool> {
    vec![
        Tool::new("add", |args| Ok((args.f64("a")? + args.f64("b")?).to_string()))
            .describe("Add two numbers")
            .param(ParameterDescriptor::new("a", ParamShape::Number).describe("First addend"))
            .param(ParameterDescriptor::new("b", ParamShape::Number).describe("Second addend")),
        Tool::new("echo", |args| {
            let text = args.str("text")?;
            Ok(if args.bool("uppercase")? {
                text.to_uppercase()
            } else {
                text.to_string()
            })
        })
        .describe("Echo text back, optionally uppercased")
        .param(ParameterDescriptor::new("text", ParamShape::String).describe("Text to echo"))
        .param(
            ParameterDescriptor::new("uppercase", ParamShape::Boolean)
                .describe("Uppercase the echoed text")
                .with_default(false),
        ),
        Tool::new("format_duration", |args| {
            format_duration(args.i64("seconds")?, args.str("style")?)
        })
        .describe("Render a number of seconds as a human readable duration")
        .param(
            ParameterDescriptor::new("seconds", ParamShape::Integer)
                .describe("Duration in whole seconds"),
        )
        .param(
            ParameterDescriptor::new("style", ParamShape::enumeration(["short", "long"]))
                .describe("Output style")
                .with_default("short"),
        ),
        Tool::new("fail", |args| {
            bail!(
                "{}",
                args.opt_str("reason")?.unwrap_or("failure requested")
            )
        })
        .describe("Always fails; useful for checking client error rendering")
        .param(ParameterDescriptor::new("reason", ParamShape::String).nullable()),
    ]
}

pub fn format_duration(seconds: i64, style: &str) -> anyhow::Result<String> {
    if seconds < 0 {
        bail!("seconds must not be negative");
    }

    let (hours, minutes, secs) = (seconds / 3600, seconds % 3600 / 60, seconds % 60);
    let rendered = match style {
        "short" => format!("{hours}h {minutes}m {secs}s"),
        _ => format!(
            "{hours} {}, {minutes} {}, {secs} {}",
            plural(hours, "hour"),
            plural(minutes, "minute"),
            plural(secs, "second")
        ),
    };
    Ok(rendered)
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        unit.to_string()
    } else {
        format!("{unit}s")
    }
}
