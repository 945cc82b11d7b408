use std::io::{self, Read};
use std::thread;

use crossbeam_channel as cb;
use log::{debug, warn};

/// Forward every byte read from `reader` to the returned channel from a
/// background thread. The thread exits on EOF, a read error, or once the
/// receiver is dropped.
pub fn spawn_reader<R>(mut reader: R) -> io::Result<cb::Receiver<u8>>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = cb::unbounded();
    thread::Builder::new()
        .name("console".into())
        .spawn(move || {
            let mut byte = [0u8; 1];
            loop {
                match reader.read(&mut byte) {
                    Ok(0) => {
                        debug!("console closed");
                        break;
                    }
                    Ok(_) => {
                        if tx.send(byte[0]).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(e) => {
                        warn!("console read failed: {e}");
                        break;
                    }
                }
            }
        })?;
    Ok(rx)
}

pub fn spawn_stdin_reader() -> io::Result<cb::Receiver<u8>> {
    spawn_reader(io::stdin())
}
