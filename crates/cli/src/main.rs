//! Command line tool for seglog write-ahead logs.
//!
//! Two subcommands:
//! - `seglog init -d DIR [-l ENCODING] [-c CHECKSUM]`: initialize a new log
//! - `seglog describe -d DIR`: walk the log and print segment details
//!
//! Exit code 0 on success, 1 on any error.

use std::path::PathBuf;
use std::process;

use clap::{Arg, ArgMatches, Command};

use seglog::{EntryChecksumType, EntryLengthEncoding, Reader, WriterOptions};

fn build_cli() -> Command {
    let directory = Arg::new("directory")
        .short('d')
        .long("directory")
        .value_name("DIR")
        .default_value(".")
        .help("The directory the write-ahead log is located in");

    Command::new("seglog")
        .about("A tool for interacting with seglog write-ahead logs")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("init")
                .about("Initializes a new write-ahead log")
                .arg(directory.clone())
                .arg(
                    Arg::new("entry-length-encoding")
                        .short('l')
                        .long("entry-length-encoding")
                        .value_name("ENCODING")
                        .value_parser(["u16", "u32", "u64", "uvarint"])
                        .default_value("u32")
                        .help("The entry length encoding to use"),
                )
                .arg(
                    Arg::new("entry-checksum-type")
                        .short('c')
                        .long("entry-checksum-type")
                        .value_name("CHECKSUM")
                        .value_parser(["crc32", "crc64"])
                        .default_value("crc32")
                        .help("The entry checksum type to use"),
                ),
        )
        .subcommand(
            Command::new("describe")
                .about("Prints detailed information about the write-ahead log")
                .arg(directory),
        )
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let matches = build_cli().get_matches();
    let result = match matches.subcommand() {
        Some(("init", sub_matches)) => run_init(sub_matches),
        Some(("describe", sub_matches)) => run_describe(sub_matches),
        _ => unreachable!("subcommand is required"),
    };

    if let Err(message) = result {
        eprintln!("Error: {message}");
        process::exit(1);
    }
}

fn directory_arg(matches: &ArgMatches) -> PathBuf {
    PathBuf::from(matches.get_one::<String>("directory").expect("has default"))
}

fn run_init(matches: &ArgMatches) -> Result<(), String> {
    let directory = directory_arg(matches);

    let entry_length_encoding =
        match matches.get_one::<String>("entry-length-encoding").expect("has default").as_str() {
            "u16" => EntryLengthEncoding::U16,
            "u32" => EntryLengthEncoding::U32,
            "u64" => EntryLengthEncoding::U64,
            "uvarint" => EntryLengthEncoding::Uvarint,
            other => return Err(format!("unsupported entry length encoding {other:?}")),
        };
    let entry_checksum_type =
        match matches.get_one::<String>("entry-checksum-type").expect("has default").as_str() {
            "crc32" => EntryChecksumType::Crc32,
            "crc64" => EntryChecksumType::Crc64,
            other => return Err(format!("unsupported entry checksum type {other:?}")),
        };

    let options = WriterOptions::new()
        .with_entry_length_encoding(entry_length_encoding)
        .with_entry_checksum_type(entry_checksum_type);
    seglog::init(&directory, options).map_err(|err| err.to_string())?;

    println!("WAL initialized at {:?}.", directory.display().to_string());
    Ok(())
}

fn run_describe(matches: &ArgMatches) -> Result<(), String> {
    let directory = directory_arg(matches);

    let segments =
        seglog::segment::list_segments(&directory).map_err(|err| err.to_string())?;
    let Some(&first_segment) = segments.first() else {
        return Err(format!("no segment found in {:?}", directory.display().to_string()));
    };

    let mut reader = Reader::new(&directory, first_segment).map_err(|err| err.to_string())?;

    let mut current_path = PathBuf::new();
    let mut entry_count: u64 = 0;
    loop {
        if current_path != reader.file_path() {
            current_path = reader.file_path().to_path_buf();
            let header = reader.header();
            println!("Segment:               {}", current_path.display());
            let magic = String::from_utf8_lossy(&header.magic);
            println!("Magic:                 {}", magic.trim_end_matches('\0'));
            println!("Version:               {}", header.version);
            println!("Entry Length Encoding: {}", header.entry_length_encoding);
            println!("Entry Checksum Type:   {}", header.entry_checksum_type);
            println!("First Sequence Number: {}", header.first_sequence_number);
            println!();
        }

        if !reader.next() {
            break;
        }
        entry_count += 1;
    }

    let next_sequence_number = reader.next_sequence_number();
    reader.close().map_err(|err| err.to_string())?;

    println!("Entries:               {entry_count}");
    println!("Next Sequence Number:  {next_sequence_number}");
    Ok(())
}
