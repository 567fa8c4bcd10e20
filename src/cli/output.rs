//! Handles all user-facing output for the CLI.
//!
//! Everything the binary prints to stdout goes through here so colors and
//! layout stay consistent across subcommands.

use std::io::Write;

use difference::{Changeset, Difference};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::ast::fep::FepModule;
use crate::ast::SExpr;
use crate::errors::{ErrorKind, SableError};
use crate::macros::{ExpansionStep, MacroProvenance};

// ============================================================================
// CORE OUTPUT FUNCTIONS
// ============================================================================

/// Print each datum on its own line.
pub fn print_data(data: &[SExpr]) {
    for datum in data {
        println!("{}", datum);
    }
}

pub fn print_fep(module: &FepModule) {
    println!("{}", module.to_sexpr());
}

pub fn print_fep_json(module: &FepModule) -> Result<(), SableError> {
    let json = serde_json::to_string_pretty(module).map_err(|e| {
        SableError::new(ErrorKind::Io {
            path: "<stdout>".into(),
            message: e.to_string(),
        })
    })?;
    println!("{}", json);
    Ok(())
}

/// Print the values of a module's top-level expressions.
pub fn print_values(values: &[SExpr]) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    for value in values {
        let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true));
        let _ = writeln!(stdout, "{}", value);
    }
    let _ = stdout.reset();
}

/// Prints a macro expansion trace with colored line diffs between steps.
///
/// Each step is shown as the transformer's input followed by the lines its
/// output changed.
pub fn print_trace(trace: &[ExpansionStep]) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);

    if trace.is_empty() {
        let _ = writeln!(stdout, "(no expansion steps)");
        return;
    }

    for (i, step) in trace.iter().enumerate() {
        let origin = match step.provenance {
            MacroProvenance::Native => "native",
            MacroProvenance::User => "user",
        };
        let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true));
        let _ = writeln!(stdout, "--- Step {}: {} ({}) ---", i, step.macro_name, origin);
        let _ = stdout.reset();

        let before = layout(&step.input);
        let after = layout(&step.output);
        let changeset = Changeset::new(&before, &after, "\n");
        print_diff(&mut stdout, &changeset.diffs);
        let _ = writeln!(stdout);
    }
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

/// One line per top-level element, so diffs point at the part that moved.
fn layout(form: &SExpr) -> String {
    match form.to_vec() {
        Some(items) if items.len() > 1 => items.iter().map(|item| item.to_string()).collect::<Vec<_>>().join("\n"),
        _ => form.to_string(),
    }
}

fn print_diff(stdout: &mut StandardStream, diffs: &[Difference]) {
    for diff in diffs {
        for (prefix, color, text) in diff_lines(diff) {
            let _ = match color {
                Some(color) => stdout.set_color(ColorSpec::new().set_fg(Some(color))),
                None => stdout.reset(),
            };
            let _ = writeln!(stdout, "{}{}", prefix, text);
        }
    }
    let _ = stdout.reset();
}

fn diff_lines(diff: &Difference) -> Vec<(char, Option<Color>, &str)> {
    let (prefix, color, text) = match diff {
        Difference::Same(x) => (' ', None, x),
        Difference::Add(x) => ('+', Some(Color::Green), x),
        Difference::Rem(x) => ('-', Some(Color::Red), x),
    };
    text.lines().map(|line| (prefix, color, line)).collect()
}
