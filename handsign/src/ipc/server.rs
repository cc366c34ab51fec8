//! IPC server: line-framed s-expression loop over a reader/writer pair.
//!
//! Each non-empty input line is one request; each request gets exactly
//! one response line.  The loop ends when the input is closed.

use std::io::{self, BufRead, Write};

use tracing::{info, warn};

use super::dispatch;
use crate::session::Session;

/// Maximum request line size (1 MiB).
const MAX_MESSAGE_SIZE: usize = 1_048_576;

/// Serve requests until `reader` reaches end of input.
///
/// With `trace` set, every request and response is logged.
pub fn serve<R: BufRead, W: Write>(
    session: &mut Session,
    reader: R,
    mut writer: W,
    trace: bool,
) -> io::Result<()> {
    let mut handled: u64 = 0;
    for line in reader.lines() {
        let line = line?;
        let raw = line.trim();
        if raw.is_empty() {
            continue;
        }

        let response = if raw.len() > MAX_MESSAGE_SIZE {
            warn!(len = raw.len(), "message exceeds maximum size");
            "(:type :response :id 0 :status :error :reason \"message too large\")".to_string()
        } else {
            if trace {
                info!(direction = "in", "{}", raw);
            }
            dispatch::handle_message(session, raw)
        };

        if trace {
            info!(direction = "out", "{}", response);
        }
        writeln!(writer, "{}", response)?;
        writer.flush()?;
        handled += 1;
    }
    info!(handled, "input closed, IPC loop finished");
    Ok(())
}
