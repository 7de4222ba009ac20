use clap::{Args, Parser, Subcommand};
use libpack4::error::PackResult;
use libpack4::hash::Oid;
use libpack4::obj::ObjType;
use libpack4::pack::{Pack, TreeIter};
use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pack4", about = "inspect v4 object packs")]
struct Pack4Opts {
    #[command(subcommand)]
    subcmd: Pack4SubCmd,
}

#[derive(Subcommand)]
enum Pack4SubCmd {
    /// print the reconstructed contents of a single object
    CatFile(Pack4CatFileOpts),
    /// list every object in the pack
    List(Pack4ListOpts),
}

#[derive(Args)]
struct Pack4CatFileOpts {
    pack: PathBuf,
    idx: PathBuf,
    /// byte offset into the pack, or a 40 character object hash
    object: String,
    /// render trees one entry per line instead of raw bytes
    #[arg(short, long)]
    pretty: bool,
}

#[derive(Args)]
struct Pack4ListOpts {
    pack: PathBuf,
    idx: PathBuf,
}

pub fn run<T: Into<OsString> + Clone>(args: impl IntoIterator<Item = T>) -> PackResult<()> {
    let opts = Pack4Opts::parse_from(args);
    match opts.subcmd {
        Pack4SubCmd::CatFile(opts) => cat_file(opts),
        Pack4SubCmd::List(opts) => list(opts),
    }
}

fn cat_file(opts: Pack4CatFileOpts) -> PackResult<()> {
    let pack = Pack::open(&opts.pack, &opts.idx)?;
    let (obj_type, bytes) = match opts.object.parse::<u64>() {
        Ok(offset) => pack.read_obj_at(offset)?,
        Err(_) => pack.read_obj(opts.object.parse::<Oid>()?)?,
    };
    let stdout = std::io::stdout();
    let mut stdout = stdout.lock();
    if opts.pretty && obj_type == ObjType::Tree {
        for entry in TreeIter::new(&bytes) {
            let entry = entry?;
            writeln!(
                stdout,
                "{:06o} {} {}",
                entry.mode,
                entry.oid,
                String::from_utf8_lossy(entry.path)
            )?;
        }
    } else {
        stdout.write_all(&bytes)?;
    }
    Ok(())
}

fn list(opts: Pack4ListOpts) -> PackResult<()> {
    let pack = Pack::open(&opts.pack, &opts.idx)?;
    let stdout = std::io::stdout();
    let mut stdout = stdout.lock();
    for i in 0..pack.num_objects() {
        let offset = pack.offset_of_index(i as u64)?;
        let (header, _) = pack.read_obj_header(offset)?;
        writeln!(stdout, "{} {} {} {}", pack.oid_at(i)?, header.obj_type, header.size, offset)?;
    }
    Ok(())
}
