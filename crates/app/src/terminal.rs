use std::io::{self, Write};

use quiz_core::model::LikertValue;
use services::{QuizHost, RenderFrame, SessionProgress};

/// Host for non-interactive commands.
pub struct Silent;

impl QuizHost for Silent {
    fn render(&self, _frame: &RenderFrame<'_>) {}
}

/// Draws the session on stdout.
pub struct TerminalHost;

impl TerminalHost {
    fn emit(lines: &[String]) {
        let mut out = io::stdout().lock();
        for line in lines {
            // Closed stdout: nothing sensible left to do.
            let _ = writeln!(out, "{line}");
        }
        let _ = out.flush();
    }
}

impl QuizHost for TerminalHost {
    fn render(&self, frame: &RenderFrame<'_>) {
        let Some(question) = frame.question else {
            Self::emit(&["No questions available.".to_string()]);
            return;
        };

        let mut lines = vec![
            String::new(),
            format!("[{}]  progress {}", question.counter(), frame.progress),
            question.text().to_string(),
        ];
        for value in LikertValue::ALL {
            let marker = if question.answer == Some(value) { '*' } else { ' ' };
            lines.push(format!("  {marker} {value}) {}", value.label()));
        }

        let mut hints = Vec::new();
        if frame.can_retreat {
            hints.push("p = previous");
        }
        if frame.can_advance {
            hints.push("n = next");
        }
        if frame.can_finalize {
            hints.push("f = finish");
        }
        hints.push("q = quit");
        lines.push(hints.join(" | "));

        Self::emit(&lines);
    }

    fn must_answer(&self, visible: bool) {
        if visible {
            Self::emit(&["Choose an option to continue.".to_string()]);
        }
    }

    fn saved(&self) {
        Self::emit(&["Progress saved!".to_string()]);
    }

    fn ready_to_finalize(&self, progress: &SessionProgress) {
        Self::emit(&[format!("All {} answered. Type f to finish.", progress.total)]);
    }
}
