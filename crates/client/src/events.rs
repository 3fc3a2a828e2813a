//! Minimal server-sent events reader: we only care which events arrived.

#[derive(Default)]
pub struct EventReader {
    buffer: String,
}

impl EventReader {
    /// Feeds a chunk of the stream and returns the names of every event
    /// completed by it. Comments (keep-alives) are skipped; an event without a
    /// name is reported as `message`.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer
            .push_str(&String::from_utf8_lossy(chunk).replace("\r\n", "\n"));

        let mut names = Vec::new();
        while let Some(end) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..end + 2).collect();

            let mut name = None;
            let mut has_fields = false;
            for line in block.lines() {
                if line.is_empty() || line.starts_with(':') {
                    continue;
                }
                has_fields = true;
                if let Some(value) = line.strip_prefix("event:") {
                    name = Some(value.trim().to_string());
                }
            }

            if has_fields {
                names.push(name.unwrap_or_else(|| "message".to_string()));
            }
        }
        names
    }
}
