//! In-place progress line on stderr

use std::io::{self, IsTerminal, Stderr, Write};
use std::time::{Duration, Instant};

use crossterm::{
    cursor::MoveToColumn,
    queue,
    style::Print,
    terminal::{Clear, ClearType},
};

/// Minimum time between redraws
const REDRAW_INTERVAL: Duration = Duration::from_millis(100);

/// `HH:MM:SS.mmm` for a frame count at a sample rate
pub fn format_time(frames: u64, sample_rate: u32) -> String {
    if sample_rate == 0 {
        return "00:00:00.000".to_string();
    }
    let millis = frames * 1000 / sample_rate as u64;
    let hours = millis / 3_600_000;
    let minutes = millis / 60_000 % 60;
    let seconds = millis / 1000 % 60;
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis % 1000)
}

/// Redraws `Time: HH:MM:SS.mmm` while processing
///
/// Does nothing when stderr is not a terminal.
pub struct ProgressLine {
    stderr: Option<Stderr>,
    sample_rate: u32,
    last_draw: Option<Instant>,
}

impl ProgressLine {
    pub fn new(sample_rate: u32) -> Self {
        let stderr = io::stderr();
        let enabled = stderr.is_terminal();
        Self {
            stderr: enabled.then_some(stderr),
            sample_rate,
            last_draw: None,
        }
    }

    /// Report the number of input frames processed so far
    pub fn update(&mut self, frames: u64) {
        if self.stderr.is_none() {
            return;
        }
        if self.last_draw.is_some_and(|t| t.elapsed() < REDRAW_INTERVAL) {
            return;
        }
        self.last_draw = Some(Instant::now());
        if let Err(e) = self.draw(frames) {
            tracing::debug!("Progress line disabled: {}", e);
            self.stderr = None;
        }
    }

    fn draw(&mut self, frames: u64) -> io::Result<()> {
        let text = format!("Time: {}", format_time(frames, self.sample_rate));
        if let Some(stderr) = self.stderr.as_mut() {
            queue!(
                stderr,
                MoveToColumn(0),
                Clear(ClearType::CurrentLine),
                Print(text)
            )?;
            stderr.flush()?;
        }
        Ok(())
    }

    /// Draw the final value and end the line
    pub fn finish(&mut self, frames: u64) {
        if self.stderr.is_some() && self.draw(frames).is_ok() {
            if let Some(stderr) = self.stderr.as_mut() {
                let _ = writeln!(stderr);
            }
        }
    }
}
