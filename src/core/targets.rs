//! Deployment target selection

use std::io::{BufRead, Write};

use super::config::DeploymentTarget;
use crate::error::TargetError;

/// How targets are picked from the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Targets flagged `default`
    Defaults,
    /// Every configured target
    All,
    /// Ask the user for one target
    Choose,
}

impl Selection {
    /// Map the `--all` / `--choose` flags; `--choose` wins
    pub fn from_flags(all: bool, choose: bool) -> Self {
        if choose {
            Self::Choose
        } else if all {
            Self::All
        } else {
            Self::Defaults
        }
    }
}

/// Select targets non-interactively, or through `input`/`output` for [`Selection::Choose`]
pub fn select_targets<R: BufRead, W: Write>(
    targets: &[DeploymentTarget],
    selection: Selection,
    input: &mut R,
    output: &mut W,
) -> Result<Vec<DeploymentTarget>, TargetError> {
    let selected = match selection {
        Selection::Defaults => targets.iter().filter(|t| t.is_default).cloned().collect(),
        Selection::All => targets.to_vec(),
        Selection::Choose if targets.is_empty() => Vec::new(),
        Selection::Choose => vec![choose_target(targets, input, output)?],
    };
    if selected.is_empty() {
        return Err(TargetError::NoTargets);
    }
    Ok(selected)
}

/// Print a numbered menu and read a choice, re-prompting on bad input
pub fn choose_target<R: BufRead, W: Write>(
    targets: &[DeploymentTarget],
    input: &mut R,
    output: &mut W,
) -> Result<DeploymentTarget, TargetError> {
    let io_err = |e: std::io::Error| TargetError::Io {
        error: e.to_string(),
    };

    writeln!(output, "Available targets:").map_err(io_err)?;
    for (i, target) in targets.iter().enumerate() {
        let mark = if target.is_default { '*' } else { ' ' };
        writeln!(output, " [{}] {} {mark}", i + 1, target.name).map_err(io_err)?;
    }

    loop {
        write!(output, "Select number: ").map_err(io_err)?;
        output.flush().map_err(io_err)?;

        let mut line = String::new();
        if input.read_line(&mut line).map_err(io_err)? == 0 {
            return Err(TargetError::InputClosed);
        }
        match line.trim().parse::<usize>() {
            Ok(n) if (1..=targets.len()).contains(&n) => return Ok(targets[n - 1].clone()),
            Ok(_) => writeln!(output, "Out of range").map_err(io_err)?,
            Err(_) => writeln!(output, "Enter a number").map_err(io_err)?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::path::PathBuf;

    fn target(name: &str, is_default: bool) -> DeploymentTarget {
        DeploymentTarget {
            name: name.to_string(),
            destination: PathBuf::from(format!("/sims/{name}")),
            simulator_command: None,
            is_default,
        }
    }

    fn fixtures() -> Vec<DeploymentTarget> {
        vec![target("x20", true), target("x18", false), target("x14", true)]
    }

    #[test]
    fn test_defaults_only() {
        let selected = select_targets(
            &fixtures(),
            Selection::Defaults,
            &mut Cursor::new(""),
            &mut Vec::new(),
        )
        .unwrap();
        let names: Vec<_> = selected.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["x20", "x14"]);
    }

    #[test]
    fn test_all_keeps_order() {
        let selected =
            select_targets(&fixtures(), Selection::All, &mut Cursor::new(""), &mut Vec::new())
                .unwrap();
        assert_eq!(selected.len(), 3);
        assert_eq!(selected[1].name, "x18");
    }

    #[test]
    fn test_no_defaults_is_error() {
        let targets = vec![target("x18", false)];
        let err = select_targets(
            &targets,
            Selection::Defaults,
            &mut Cursor::new(""),
            &mut Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, TargetError::NoTargets));
    }

    #[test]
    fn test_choose_reprompts_until_valid() {
        let mut out = Vec::new();
        let chosen =
            choose_target(&fixtures(), &mut Cursor::new("abc\n7\n2\n"), &mut out).unwrap();
        assert_eq!(chosen.name, "x18");

        let transcript = String::from_utf8(out).unwrap();
        assert!(transcript.contains(" [1] x20 *"));
        assert!(transcript.contains(" [2] x18  "));
        assert!(transcript.contains("Enter a number"));
        assert!(transcript.contains("Out of range"));
    }

    #[test]
    fn test_choose_input_closed() {
        let err = choose_target(&fixtures(), &mut Cursor::new(""), &mut Vec::new()).unwrap_err();
        assert!(matches!(err, TargetError::InputClosed));
    }

    #[test]
    fn test_selection_flags() {
        assert_eq!(Selection::from_flags(false, false), Selection::Defaults);
        assert_eq!(Selection::from_flags(true, false), Selection::All);
        assert_eq!(Selection::from_flags(true, true), Selection::Choose);
    }
}
