//! G-code to command translation
//!
//! Processes a program line by line. A line is classified by its first
//! significant character; a dispatch on the G/M number selects the
//! operation. Modal position and feed state persists across lines for
//! the duration of one `translate` call.
//!
//! Problems are accumulated as diagnostics rather than aborting: a line
//! with an invalid token still consumes the rest of the line, so one
//! malformed field yields one diagnostic instead of a cascade. Frames are
//! still produced for malformed motion lines; the aggregate error count
//! is the caller's gate against transmitting any of them.

use crate::gcode::scanner::LineScanner;
use crate::protocol::{Codec, Command, Opcode};
use routerhost_core::{ConsoleSink, GcodeError, HostConfig, ProtocolVersion, Result};
use std::path::Path;

/// Severity of a translation diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Translation continues; the output is still usable.
    Warning,
    /// The translated batch must not be transmitted.
    Error,
}

/// One problem found during translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// 1-based line number.
    pub line: u32,
    /// Whether this gates transmission.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self.severity {
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        };
        write!(f, "{} in line {}: {}", tag, self.line, self.message)
    }
}

/// Result of one translation pass.
#[derive(Debug, Default)]
pub struct TranslateOutput {
    /// Ordered command frames, ids assigned in emission order.
    pub commands: Vec<Command>,
    /// Everything worth telling the operator about.
    pub diagnostics: Vec<Diagnostic>,
}

impl TranslateOutput {
    /// Number of error-severity diagnostics. Non-zero means the whole
    /// batch should be discarded rather than transmitted.
    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    /// True if the batch must not be transmitted.
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Consume the output, yielding the commands only when no
    /// error-severity diagnostics were recorded.
    pub fn into_commands(self) -> std::result::Result<Vec<Command>, GcodeError> {
        if self.has_errors() {
            Err(GcodeError::ProgramRejected {
                error_count: self.error_count(),
            })
        } else {
            Ok(self.commands)
        }
    }
}

/// Position and feed state carried across lines.
#[derive(Debug, Clone, Copy, Default)]
struct ModalState {
    x: f32,
    y: f32,
    z: f32,
    feed: f32,
}

/// Translates G-code text into command frames.
pub struct Translator {
    codec: Codec,
    default_beep_len_ms: u32,
    default_beep_freq_hz: u32,
    max_beep_freq_hz: u32,
}

impl Translator {
    /// Create a translator for the configured protocol version.
    pub fn new(config: &HostConfig) -> Self {
        Self::with_version(config.protocol, config)
    }

    /// Create a translator with an explicit protocol version.
    pub fn with_version(version: ProtocolVersion, config: &HostConfig) -> Self {
        Self {
            codec: Codec::new(version),
            default_beep_len_ms: config.default_beep_len_ms,
            default_beep_freq_hz: config.default_beep_freq_hz,
            max_beep_freq_hz: config.max_beep_freq_hz,
        }
    }

    /// The codec this translator builds frames with.
    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    /// Translate a program. Each input line is optionally echoed to a
    /// line display; the display is a side channel, not part of the
    /// result.
    pub fn translate(&self, text: &str, display: Option<&dyn ConsoleSink>) -> TranslateOutput {
        let mut pass = Pass {
            translator: self,
            modal: ModalState::default(),
            out: TranslateOutput::default(),
            line: 0,
        };

        let lines: Vec<&str> = text.lines().collect();
        let last = lines.len().saturating_sub(1);
        for (index, raw) in lines.iter().enumerate() {
            pass.line = index as u32 + 1;
            if let Some(display) = display {
                display.append_line(raw);
            }
            pass.translate_line(raw, index == last);
        }

        pass.out
    }

    /// Read and translate a program file.
    pub fn translate_file(
        &self,
        path: impl AsRef<Path>,
        display: Option<&dyn ConsoleSink>,
    ) -> Result<TranslateOutput> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| GcodeError::FileError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(self.translate(&text, display))
    }
}

/// State of one translation pass over a program.
struct Pass<'a> {
    translator: &'a Translator,
    modal: ModalState,
    out: TranslateOutput,
    line: u32,
}

impl Pass<'_> {
    fn codec(&self) -> &Codec {
        &self.translator.codec
    }

    /// Command ids are the running count of frames already produced.
    fn next_id(&self) -> u16 {
        self.out.commands.len() as u16
    }

    fn warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(line = self.line, "{}", message);
        self.out.diagnostics.push(Diagnostic {
            line: self.line,
            severity: Severity::Warning,
            message,
        });
    }

    fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(line = self.line, "{}", message);
        self.out.diagnostics.push(Diagnostic {
            line: self.line,
            severity: Severity::Error,
            message,
        });
    }

    fn translate_line(&mut self, raw: &str, is_last: bool) {
        let mut scanner = LineScanner::new(raw);
        match scanner.peek() {
            Some(b'G') | Some(b'M') => match scanner.next_word() {
                Some(Ok(word)) => {
                    if word.value < 0.0 || word.value.fract() != 0.0 {
                        self.unrecognized(word.letter);
                        return;
                    }
                    let number = word.value as i32;
                    match word.letter {
                        'G' => self.dispatch_g(number, scanner),
                        _ => self.dispatch_m(number, scanner),
                    }
                }
                Some(Err(e)) => self.error(format!("column {}: {}", e.column, e.message)),
                None => {}
            },
            // Comment-only lines produce nothing. A blank interior line
            // is flagged like any other unrecognized line; only the
            // trailing empty line at end-of-input gets a pass.
            None => {
                let commented = raw.trim_start().starts_with(';');
                if !commented && !is_last {
                    self.error("Lines should start with 'G' or 'M'");
                }
            }
            Some(_) => self.error("Lines should start with 'G' or 'M'"),
        }
    }

    fn unrecognized(&mut self, letter: char) {
        match letter {
            'G' => self.error("Unrecognized G-number."),
            _ => self.error("Unrecognized M-number."),
        }
    }

    fn dispatch_g(&mut self, number: i32, scanner: LineScanner<'_>) {
        match number {
            1 => self.motion(scanner, true),
            2 => self.motion(scanner, false),
            4 => self.wait(scanner),
            28 => self.home(scanner),
            92 => self.set_position(scanner),
            _ => self.error("Unrecognized G-number."),
        }
    }

    fn dispatch_m(&mut self, number: i32, scanner: LineScanner<'_>) {
        match number {
            0 => self.graceful_stop(),
            1 => self.echo(scanner),
            3 => self.push(|c, id| c.with_byte(Opcode::Spindle, id, 1)),
            5 => self.push(|c, id| c.with_byte(Opcode::Spindle, id, 0)),
            17 => self.push(|c, id| c.with_byte(Opcode::Steppers, id, 1)),
            18 => self.push(|c, id| c.with_byte(Opcode::Steppers, id, 0)),
            105 => self.push(|c, id| c.empty(Opcode::GetSpindleSpeed, id)),
            112 => self.push(|c, id| c.empty(Opcode::Estop, id)),
            114 => self.push(|c, id| c.empty(Opcode::GetPosition, id)),
            119 => self.push(|c, id| c.empty(Opcode::GetEndstops, id)),
            300 => self.beep(scanner),
            _ => self.error("Unrecognized M-number."),
        }
    }

    fn push(&mut self, build: impl FnOnce(&Codec, u16) -> Command) {
        let cmd = build(self.codec(), self.next_id());
        self.out.commands.push(cmd);
    }

    /// G1 (absolute) / G2 (relative): axis/value pairs to end of line.
    /// Invalid tokens are recorded but the line is still consumed and a
    /// frame is still emitted; the error count gates transmission.
    fn motion(&mut self, mut scanner: LineScanner<'_>, absolute: bool) {
        let mut tx = if absolute { self.modal.x } else { 0.0 };
        let mut ty = if absolute { self.modal.y } else { 0.0 };
        let mut tz = if absolute { self.modal.z } else { 0.0 };
        let mut tf = self.modal.feed;

        while let Some(result) = scanner.next_word() {
            match result {
                Ok(word) => {
                    if word.value < 0.0 {
                        self.error("Negative numbers don't exist.");
                    }
                    match word.letter {
                        'X' => tx = word.value,
                        'Y' => ty = word.value,
                        'Z' => tz = word.value,
                        'F' => tf = word.value,
                        _ => self.error(
                            "Expecting either X#, Y#, Z#, or F# as arguments to G1 or G2",
                        ),
                    }
                }
                Err(e) => self.error(format!("column {}: {}", e.column, e.message)),
            }
        }

        self.modal.x = if absolute { tx } else { self.modal.x + tx };
        self.modal.y = if absolute { ty } else { self.modal.y + ty };
        self.modal.z = if absolute { tz } else { self.modal.z + tz };
        self.modal.feed = tf;

        let (op, x, y, z) = if absolute {
            (Opcode::Move, self.modal.x, self.modal.y, self.modal.z)
        } else {
            (Opcode::RelMove, tx, ty, tz)
        };
        let feed = tf;
        self.push(|c, id| c.motion(op, id, x, y, z, feed));
    }

    /// G4: wait by seconds (S), milliseconds (P), or pause for the
    /// operator (M).
    fn wait(&mut self, mut scanner: LineScanner<'_>) {
        match scanner.next_word() {
            Some(Ok(word)) => {
                if word.value < 0.0 {
                    self.error("Negative numbers don't exist.");
                }
                match word.letter {
                    'S' => {
                        let ms = (word.value as i64).wrapping_mul(1000) as u16;
                        self.push(|c, id| c.with_u16(Opcode::Wait, id, ms));
                    }
                    'P' => {
                        let ms = word.value as u16;
                        self.push(|c, id| c.with_u16(Opcode::Wait, id, ms));
                    }
                    'M' => {
                        let signal = word.value as u8;
                        self.push(|c, id| c.with_byte(Opcode::Pause, id, signal));
                    }
                    _ => self.error("Expecting either S#, P#, or M# after G4 - wait"),
                }
            }
            Some(Err(e)) => self.error(format!("column {}: {}", e.column, e.message)),
            None => self.error("Expecting either S#, P#, or M# after G4 - wait"),
        }
    }

    /// G28: home the named axes, or all three when none are given.
    fn home(&mut self, mut scanner: LineScanner<'_>) {
        let mask = if scanner.at_end() {
            0b111
        } else {
            scanner.axis_letters()
        };
        self.push(|c, id| c.with_byte(Opcode::Home, id, mask));
    }

    /// G92: redefine the current modal coordinates without motion.
    fn set_position(&mut self, mut scanner: LineScanner<'_>) {
        let mut tx = self.modal.x;
        let mut ty = self.modal.y;
        let mut tz = self.modal.z;

        while let Some(result) = scanner.next_word() {
            match result {
                Ok(word) => {
                    if word.value < 0.0 {
                        self.error("Negative numbers don't exist.");
                    }
                    match word.letter {
                        'X' => tx = word.value,
                        'Y' => ty = word.value,
                        'Z' => tz = word.value,
                        _ => self.error(
                            "Expecting either X#, Y#, or Z# as arguments to G92 - set position",
                        ),
                    }
                }
                Err(e) => self.error(format!("column {}: {}", e.column, e.message)),
            }
        }

        self.modal.x = tx;
        self.modal.y = ty;
        self.modal.z = tz;
        let (x, y, z) = (tx, ty, tz);
        self.push(|c, id| c.set_position(id, x, y, z));
    }

    /// M0: graceful stop. Expands into three consecutive frames (spindle
    /// off, home Z, steppers off) consuming three consecutive ids.
    fn graceful_stop(&mut self) {
        self.push(|c, id| c.with_byte(Opcode::Spindle, id, 0));
        self.push(|c, id| c.with_byte(Opcode::Home, id, 0b100));
        self.push(|c, id| c.with_byte(Opcode::Steppers, id, 0));
    }

    /// M1: copy the raw rest of the line into the payload, truncated to
    /// frame capacity.
    fn echo(&mut self, scanner: LineScanner<'_>) {
        let raw = scanner.remainder();
        let raw = raw.strip_prefix(' ').unwrap_or(raw);
        let bytes = raw.as_bytes();
        self.push(|c, id| c.echo(id, bytes));
    }

    /// M300: beep with frequency (S, Hz) and duration (P, ms) with
    /// defaults. Frequencies above the firmware ceiling are clamped with
    /// a warning, not an error.
    fn beep(&mut self, mut scanner: LineScanner<'_>) {
        let mut freq = self.translator.default_beep_freq_hz as f32;
        let mut len = self.translator.default_beep_len_ms as f32;

        while let Some(result) = scanner.next_word() {
            match result {
                Ok(word) => {
                    if word.value < 0.0 {
                        self.error("Negative numbers don't exist.");
                    }
                    match word.letter {
                        'S' => freq = word.value,
                        'P' => len = word.value,
                        _ => self.error("Invalid argument to M300 - beep"),
                    }
                }
                Err(e) => self.error(format!("column {}: {}", e.column, e.message)),
            }
        }

        let ceiling = self.translator.max_beep_freq_hz as f32;
        if freq > ceiling {
            self.warning(format!(
                "Beep with frequency greater than {} Hz unsupported. Using {} Hz.",
                self.translator.max_beep_freq_hz, self.translator.max_beep_freq_hz
            ));
            freq = ceiling;
        }
        let (freq, len) = (freq as u16, len as u16);
        self.push(|c, id| c.with_u16_pair(Opcode::Beep, id, freq, len));
    }
}
