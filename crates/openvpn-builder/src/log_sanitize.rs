use std::process::Output;

const MAX_CAPTURE_CHARS: usize = 8192;

#[derive(Clone, Copy)]
enum Escape {
    Start,
    Csi,
    Osc,
    OscEsc,
}

/// Strip terminal escapes and control characters from one line of tool output.
pub fn sanitize_line(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut esc: Option<Escape> = None;

    for c in input.chars() {
        if let Some(state) = esc {
            esc = match (state, c) {
                (Escape::Start, '[') => Some(Escape::Csi),
                (Escape::Start, ']') => Some(Escape::Osc),
                (Escape::Start, _) => None,
                (Escape::Csi, '@'..='~') => None,
                (Escape::Csi, _) => Some(Escape::Csi),
                (Escape::Osc, '\x07') => None,
                (Escape::Osc, '\x1b') => Some(Escape::OscEsc),
                (Escape::Osc, _) => Some(Escape::Osc),
                (Escape::OscEsc, '\\') => None,
                (Escape::OscEsc, _) => Some(Escape::Osc),
            };
            continue;
        }
        match c {
            '\x1b' => esc = Some(Escape::Start),
            '\t' => out.push(' '),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

/// Flatten captured bytes into a single loggable string: non-empty lines joined
/// with " | ", capped in length.
pub fn sanitize_capture(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let mut out = String::new();
    for line in text.split(['\n', '\r']) {
        let line = sanitize_line(line);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push_str(" | ");
        }
        out.push_str(line);
        if out.chars().count() >= MAX_CAPTURE_CHARS {
            let cut: String = out.chars().take(MAX_CAPTURE_CHARS).collect();
            return format!("{cut} ...[truncated]");
        }
    }
    out
}

/// stderr if present, otherwise stdout, otherwise the exit status.
pub fn command_summary(out: &Output) -> String {
    let stderr = sanitize_capture(&out.stderr);
    if !stderr.is_empty() {
        return stderr;
    }
    let stdout = sanitize_capture(&out.stdout);
    if !stdout.is_empty() {
        return stdout;
    }
    format!("status {}", out.status)
}
