//! Script adapter: a literal JSON step array, or a tiny line-oriented
//! language compiled to a step list.
//!
//! Line forms: `goto <url>`, `snapshot`, `click <nodeId>`,
//! `fill <nodeId> <value...>`. Unrecognized non-empty lines compile to a
//! snapshot step; blank lines and `#` comments are skipped.

use step_engine::{Step, StepKind, StepSource, Target};
use tabweaver_core_types::OpError;

pub fn compile(source: &str) -> Result<Vec<Step>, OpError> {
    let trimmed = source.trim_start();
    if trimmed.starts_with('[') {
        let steps: Vec<Step> = serde_json::from_str(source)
            .map_err(|err| OpError::internal(format!("invalid step array: {err}")))?;
        return Ok(steps
            .into_iter()
            .map(|step| match step.meta {
                Some(_) => step,
                None => step.with_source(StepSource::Script),
            })
            .collect());
    }

    Ok(source
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| Step::new(compile_line(line)).with_source(StepSource::Script))
        .collect())
}

fn compile_line(line: &str) -> StepKind {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("goto"), Some(url)) => StepKind::Goto {
            url: url.to_string(),
        },
        (Some("snapshot"), _) => StepKind::Snapshot { include_a11y: true },
        (Some("click"), Some(node_id)) => StepKind::Click {
            target: Some(Target::node(node_id)),
            coord: None,
            click_count: 1,
        },
        (Some("fill"), Some(node_id)) => {
            let value: Vec<&str> = parts.collect();
            StepKind::Fill {
                target: Target::node(node_id),
                value: value.join(" "),
            }
        }
        _ => StepKind::Snapshot { include_a11y: true },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn compiles_line_script() {
        let steps = compile(
            "# warmup\n\
             goto https://example.test/form\n\
             snapshot\n\
             click n0.1\n\
             fill n0.2 hello world\n",
        )
        .unwrap();
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0].kind.name(), "goto");
        assert_eq!(steps[2].kind.name(), "click");
        match &steps[3].kind {
            StepKind::Fill { value, .. } => assert_eq!(value, "hello world"),
            other => panic!("expected fill, got {other:?}"),
        }
        assert!(steps
            .iter()
            .all(|step| matches!(step.meta.as_ref().unwrap().source, StepSource::Script)));
    }

    #[test]
    fn unknown_lines_default_to_snapshot() {
        let steps = compile("dance\n").unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].kind.name(), "snapshot");
    }

    #[test]
    fn accepts_literal_step_arrays() {
        let raw = json!([
            {"name": "goto", "args": {"url": "https://example.test"}},
            {"name": "snapshot", "args": {"includeA11y": true}},
        ])
        .to_string();
        let steps = compile(&raw).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].kind.name(), "snapshot");
    }

    #[test]
    fn malformed_json_array_is_internal_error() {
        let err = compile("[{\"name\":").unwrap_err();
        assert_eq!(err.code, tabweaver_core_types::ErrorCode::Internal);
    }
}
