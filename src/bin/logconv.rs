/*! Convert a GNSS receiver capture to long ASCII.

Reads a message-definition database and a capture file in any mix of wire
formats, re-encodes every decodable message as long ASCII into
`<input>.asc`, and prints per-message-id conversion counts.

```no_run
$ logconv messages.json capture.gps
[…]
42: 1284
140: 512
```
*/
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use log::warn;

use gnsslog::decoder::{Decoder, DecoderConfig, Read};
use gnsslog::encoder::Encoder;
use gnsslog::header::WireFormat;
use gnsslog::message_db::MessageDatabase;
use gnsslog::source::FileSource;

#[derive(clap::Parser, Debug)]
#[command(version, about)]
struct Opt {
    /// Message-definition database (JSON).
    database: PathBuf,

    /// Capture file to convert; output is written next to it as
    /// `<input>.asc`.
    input: PathBuf,

    #[arg(short = 'v', action = clap::ArgAction::Count, help = "Increase verbosity")]
    verbose: u8,
}

fn main() -> Result<()> {
    let opt = match Opt::try_parse() {
        Ok(opt) => opt,
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };
    stderrlog::new()
        .module(module_path!())
        .module("gnsslog")
        .verbosity(usize::from(opt.verbose))
        .timestamp(stderrlog::Timestamp::Second)
        .init()?;

    for path in [&opt.database, &opt.input] {
        if !path.exists() {
            eprintln!("File {} does not exist", path.display());
            std::process::exit(1);
        }
    }

    let t = Instant::now();
    eprint!("Loading database… ");
    let db = MessageDatabase::from_file(&opt.database)?;
    eprintln!("done ({} ms)", t.elapsed().as_millis());

    let source = FileSource::open(&opt.input)?;
    let mut decoder = Decoder::new(
        &db,
        source,
        DecoderConfig {
            enable_unknown: false,
            ..DecoderConfig::default()
        },
    );
    let encoder = Encoder::new(&db);

    let out_path = {
        let mut p = opt.input.clone().into_os_string();
        p.push(".asc");
        PathBuf::from(p)
    };
    let mut out = BufWriter::new(File::create(&out_path)?);

    let mut counts: BTreeMap<u16, u64> = BTreeMap::new();
    let t = Instant::now();
    loop {
        match decoder.read_message() {
            Ok(Read::Message(msg)) => {
                let encoded = match encoder.encode_message(&msg, WireFormat::Ascii) {
                    Ok(bytes) => bytes,
                    // NMEA sentences and console responses have no long
                    // ASCII form; they pass through unchanged.
                    Err(gnsslog::Error::InvalidEncodeFormat { .. }) => msg.raw.clone(),
                    Err(e) => {
                        warn!("skipping {}: {e}", msg.header.message_name);
                        continue;
                    }
                };
                out.write_all(&encoded)?;
                *counts.entry(msg.header.message_id).or_default() += 1;
            }
            Ok(Read::Unknown(_)) | Ok(Read::Pending) => {}
            Ok(Read::Eos) => break,
            Err(e) => warn!("{e}"),
        }
    }
    out.flush()?;
    eprintln!("Conversion time: {} ms", t.elapsed().as_millis());

    for (id, n) in &counts {
        println!("{id}: {n}");
    }
    Ok(())
}
