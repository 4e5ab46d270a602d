use super::ingress::IngressMessage;
use log::{error, info};
use std::fs::File;
use std::io::{self, BufRead, BufReader};

/// Source of input messages.
pub trait Gateway: Send {
    /// Fetch the next message. Returns None once the source is exhausted.
    fn next(&mut self) -> Option<IngressMessage>;
}

/// Reads one JSON [`IngressMessage`] per line.
///
/// Blank lines and lines starting with `#` are skipped. Lines that fail to
/// parse are logged and skipped.
pub struct JsonLinesGateway<R> {
    reader: R,
    line: String,
    line_no: usize,
}

impl<R: BufRead + Send> JsonLinesGateway<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            line_no: 0,
        }
    }
}

impl JsonLinesGateway<Box<dyn BufRead + Send>> {
    /// Opens `input`, where `-` means stdin.
    pub fn open(input: &str) -> io::Result<Self> {
        let reader: Box<dyn BufRead + Send> = if input == "-" {
            info!("[JsonLinesGateway] Reading commands from stdin");
            Box::new(BufReader::new(io::stdin()))
        } else {
            info!("[JsonLinesGateway] Reading commands from {}", input);
            Box::new(BufReader::new(File::open(input)?))
        };
        Ok(Self::new(reader))
    }
}

impl<R: BufRead + Send> Gateway for JsonLinesGateway<R> {
    fn next(&mut self) -> Option<IngressMessage> {
        loop {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => {
                    error!("[JsonLinesGateway] Read failed after line {}: {}", self.line_no, e);
                    return None;
                }
            }
            self.line_no += 1;

            let trimmed = self.line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            match serde_json::from_str::<IngressMessage>(trimmed) {
                Ok(message) => return Some(message),
                Err(e) => error!(
                    "[JsonLinesGateway] Failed to parse line {}: {} ({})",
                    self.line_no, e, trimmed
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oms::TenantId;

    #[test]
    fn skips_comments_blank_and_malformed_lines() {
        let input = "# reference data\n\n{not json}\n{\"Restricted\":{\"tenant_id\":\"T1\",\"instrument_id\":\"XYZ\"}}\n";
        let mut gateway = JsonLinesGateway::new(input.as_bytes());

        let Some(IngressMessage::Restricted { tenant_id, .. }) = gateway.next() else {
            panic!("expected the restricted-list line");
        };
        assert_eq!(tenant_id, TenantId::new("T1"));
        assert!(gateway.next().is_none());
    }
}
