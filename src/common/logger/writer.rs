use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::Path,
    sync::Arc,
};

use parking_lot::Mutex;

/// Removes ANSI escape sequences so the log file stays plain text.
pub fn strip_ansi_escapes(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' {
            in_escape = true;
        } else if in_escape {
            if c.is_ascii_alphabetic() {
                in_escape = false;
            }
        } else {
            result.push(c);
        }
    }
    result
}

/// Appends to a file and trims it back to the newest `max_lines` lines
/// every time roughly a tenth of that many lines have been written.
#[derive(Clone)]
pub(crate) struct LineCappedWriter {
    path: String,
    max_lines: u32,
    pending: Arc<Mutex<u32>>,
}

impl LineCappedWriter {
    pub fn new(path: String, max_lines: u32) -> Self {
        Self {
            path,
            max_lines: max_lines.max(1),
            pending: Arc::new(Mutex::new(0)),
        }
    }

    fn trim(&self) -> io::Result<()> {
        if !Path::new(&self.path).exists() {
            return Ok(());
        }

        let contents = fs::read_to_string(&self.path)?;
        let lines: Vec<&str> = contents.lines().collect();
        let keep = self.max_lines as usize;
        if lines.len() > keep {
            let mut tail = lines[lines.len() - keep..].join("\n");
            tail.push('\n');
            fs::write(&self.path, tail)?;
        }
        Ok(())
    }
}

impl io::Write for LineCappedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?
            .write_all(buf)?;

        let mut pending = self.pending.lock();
        *pending += buf.iter().filter(|&&b| b == b'\n').count() as u32;

        if *pending >= (self.max_lines / 10).max(50) {
            if let Err(e) = self.trim() {
                eprintln!("Failed to trim log file: {}", e);
            }
            *pending = 0;
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LineCappedWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_color_codes() {
        assert_eq!(strip_ansi_escapes("\x1b[32mINFO \x1b[0mready"), "INFO ready");
    }

    #[test]
    fn trims_to_newest_lines() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out.log");

        let mut writer = LineCappedWriter::new(path.to_string_lossy().into_owned(), 10);
        for i in 0..100 {
            writeln!(writer, "line {}", i).unwrap();
        }

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 10);
        assert_eq!(lines.last(), Some(&"line 99"));
    }
}
