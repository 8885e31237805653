//! Spoolbox client - thin interactive terminal front-end
//!
//! Collects one command block at a time from stdin, ships it to the
//! server, and echoes whatever the server answers. All protocol
//! intelligence lives on the server side.

use anyhow::{bail, Context, Result};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::net::TcpStream;

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (address, port) = match args.as_slice() {
        [address, port, ..] => (
            address.clone(),
            port.parse::<u16>().context("Invalid port")?,
        ),
        _ => bail!("Usage: spoolbox-client <server-address> <port>"),
    };

    let stream = TcpStream::connect((address.as_str(), port))
        .await
        .context("Connect error - no server available")?;
    println!("Connection with server ({}) established", address);

    let (mut read_half, mut write_half) = stream.into_split();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut reply = vec![0u8; 8192];

    // Greeting banner
    let n = read_half.read(&mut reply).await?;
    print!("{}", String::from_utf8_lossy(&reply[..n]));

    loop {
        let Some(verb) = prompt(&mut stdin).await? else {
            break;
        };
        if verb.is_empty() {
            continue;
        }

        let mut block = format!("{}\n", verb);
        match verb.as_str() {
            "QUIT" => {
                write_half.write_all(block.as_bytes()).await?;
                break;
            }
            // Username and password lines
            "LOGIN" => {
                for _ in 0..2 {
                    let Some(line) = prompt(&mut stdin).await? else {
                        bail!("Input closed mid-command");
                    };
                    block.push_str(&line);
                    block.push('\n');
                }
            }
            // Recipient, subject, then body lines up to a lone "."
            "SEND" => loop {
                let Some(line) = prompt(&mut stdin).await? else {
                    bail!("Input closed mid-command");
                };
                block.push_str(&line);
                block.push('\n');
                if line == "." {
                    break;
                }
            },
            // Subject line
            "READ" | "DEL" => {
                let Some(line) = prompt(&mut stdin).await? else {
                    bail!("Input closed mid-command");
                };
                block.push_str(&line);
                block.push('\n');
            }
            // LIST and anything unrecognized go out as-is; the server
            // answers unknown verbs with an error.
            _ => {}
        }

        write_half.write_all(block.as_bytes()).await?;
        write_half.flush().await?;

        let n = read_half.read(&mut reply).await?;
        if n == 0 {
            println!("Server closed remote socket");
            break;
        }
        print!("{}", String::from_utf8_lossy(&reply[..n]));
    }

    Ok(())
}

async fn prompt(stdin: &mut Lines<BufReader<Stdin>>) -> Result<Option<String>> {
    print!(">> ");
    std::io::stdout().flush()?;
    Ok(stdin.next_line().await?)
}
