//! slotcache CLI client
//!
//! A thin interactive client: lines typed at the prompt are sent
//! verbatim (with a trailing `\r\n`) to the server, and raw bytes read
//! back are printed as they arrive. Useful for manual protocol
//! smoke-testing; not part of the cache core.

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Server host
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = 11211)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);

    println!("Connecting to slotcache at {addr}...");
    let stream = TcpStream::connect(&addr).await?;
    let (reader, mut writer) = stream.into_split();

    tokio::spawn(async move {
        let mut reader = reader;
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) | Err(_) => {
                    println!("\nConnection closed by server");
                    std::process::exit(0);
                }
                Ok(n) => print!("{}", String::from_utf8_lossy(&buf[..n])),
            }
        }
    });

    println!("Connected! Type raw protocol lines (e.g. `version`), `quit` to exit.\n");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\r\n").await?;
        if line.trim().eq_ignore_ascii_case("quit") {
            break;
        }
    }

    Ok(())
}
