//! Character-by-character text reveal.

use std::io::{self, Write};
use std::time::Duration;

/// Reveals a string one character at a time with a fixed delay.
///
/// Setting a different text restarts the reveal. The completion callback
/// fires once per text, when the last character has been shown.
pub struct Typewriter {
    text: String,
    /// Byte offset of the revealed prefix.
    shown: usize,
    delay: Duration,
    completed: bool,
    on_complete: Option<Box<dyn FnMut() + Send>>,
}

impl Typewriter {
    pub fn new(delay: Duration) -> Self {
        Self {
            text: String::new(),
            shown: 0,
            delay,
            completed: false,
            on_complete: None,
        }
    }

    pub fn with_on_complete(mut self, callback: impl FnMut() + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    /// Replace the text; restarts only if it actually changed.
    pub fn set_text(&mut self, text: &str) -> bool {
        if text == self.text {
            return false;
        }
        self.text = text.to_string();
        self.shown = 0;
        self.completed = false;
        true
    }

    /// Reveal the next character.
    pub fn tick(&mut self) -> Option<char> {
        match self.text[self.shown..].chars().next() {
            Some(c) => {
                self.shown += c.len_utf8();
                Some(c)
            }
            None => {
                self.complete();
                None
            }
        }
    }

    pub fn displayed(&self) -> &str {
        &self.text[..self.shown]
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Type the whole text into `out`, sleeping between characters.
    pub async fn type_out<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        while let Some(c) = self.tick() {
            write!(out, "{}", c)?;
            out.flush()?;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }
        Ok(())
    }

    fn complete(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        if let Some(callback) = self.on_complete.as_mut() {
            callback();
        }
    }
}
