#![allow(dead_code)]
#![allow(unused_variables)]
#![allow(unused_imports)]
use dlpp::{*, error::*, log::*, settings::*, memory::*, host::*, value::*, gdb::*, lldb::*, pretty::*};
use std::{io, io::Write, path::Path, process, str::FromStr, sync::Arc};
use libc::pid_t;

// Prints a D value from a live process or a memory snapshot, the way the debugger-side printers would show it:
//   dlpp -p 1234 0x7ffc1000 'int[string]'
//   dlpp --lldb --snapshot mem.bin 0x10000 string[]

#[derive(Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Gdb,
    Lldb,
}

fn usage(program: &str) -> ! {
    eprintln!("usage: {} [--gdb|--lldb] [--escape remove|unicode|escape|none] [--max-string N] [--word-size 4|8] (-p pid | --snapshot file) address type", program);
    process::exit(1);
}

fn parse_address(s: &str) -> Result<usize> {
    Ok(match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16)?,
        None => usize::from_str(s)?,
    })
}

fn print_with<D: Debuggee>(host: &mut D, v: &Value, print: fn(&mut D, &Value) -> String, children: fn(&mut D, &Value) -> Vec<Child>) {
    println!("{}", print(host, v));
    for c in children(host, v) {
        let s = format_value(host, &c.value);
        println!("  {} = {}", c.name, s);
    }
}

fn main() {
    let mut settings = Settings::default();
    let mut flavor = Flavor::Gdb;
    let mut attach_pid: Option<pid_t> = None;
    let mut snapshot: Option<String> = None;

    let args: Vec<String> = std::env::args().collect();
    let mut i = 1usize;
    while i < args.len() && args[i].starts_with("-") {
        match &args[i][..] {
            "--gdb" => {
                flavor = Flavor::Gdb;
                i += 1;
            }
            "--lldb" => {
                flavor = Flavor::Lldb;
                i += 1;
            }
            "-p" => {
                attach_pid = args.get(i+1).map_or(None, |s| pid_t::from_str(s).ok());
                if attach_pid.is_none() {
                    eprintln!("usage: {} -p pid", args[0]);
                    process::exit(1);
                }
                i += 2;
            }
            "--snapshot" => {
                snapshot = args.get(i+1).cloned();
                if snapshot.is_none() {
                    eprintln!("--snapshot requires an argument");
                    process::exit(1);
                }
                i += 2;
            }
            "--escape" => {
                match args.get(i+1).map(|s| StringEscaping::from_str(s)) {
                    Some(Ok(e)) => settings.string_escaping = e,
                    Some(Err(e)) => {
                        eprintln!("{}", e);
                        process::exit(1);
                    }
                    None => {
                        eprintln!("--escape requires an argument");
                        process::exit(1);
                    }
                }
                i += 2;
            }
            "--max-string" => {
                match args.get(i+1).map(|s| usize::from_str(s)) {
                    Some(Ok(n)) => settings.max_string_len = n,
                    _ => {
                        eprintln!("--max-string requires a number");
                        process::exit(1);
                    }
                }
                i += 2;
            }
            "--word-size" => {
                match args.get(i+1).map(|s| usize::from_str(s)) {
                    Some(Ok(n)) => settings.word_size = n,
                    _ => {
                        eprintln!("--word-size requires a number");
                        process::exit(1);
                    }
                }
                i += 2;
            }
            x => {
                eprintln!("unrecognized argument: '{}'", x);
                process::exit(1);
            }
        }
    }
    if args.len() != i + 2 || attach_pid.is_some() == snapshot.is_some() {
        usage(&args[0]);
    }
    if let Err(e) = settings.validate() {
        eprintln!("{}", e);
        process::exit(1);
    }
    let addr = match parse_address(&args[i]) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("bad address '{}': {}", args[i], e);
            process::exit(1);
        }
    };
    let type_name = &args[i+1];

    let memory = match (attach_pid, &snapshot) {
        (Some(pid), _) => MemReader::Pid(PidMemReader::new(pid)),
        (None, Some(path)) => match SnapshotMemReader::load(Path::new(path)) {
            Ok(s) => MemReader::Snapshot(Arc::new(s)),
            Err(e) => {
                eprintln!("{}", e);
                process::exit(1);
            }
        },
        (None, None) => usage(&args[0]),
    };
    let context = HostContext::new(memory, settings);
    let type_ = match context.types.resolve(type_name) {
        Some(t) => t,
        None => {
            eprintln!("unknown type: '{}'", type_name);
            process::exit(1);
        }
    };
    let v = Value::at(addr, type_);

    let log = match flavor {
        Flavor::Gdb => {
            let mut host = GdbHost::new(context);
            print_with(&mut host, &v, GdbHost::print_value, GdbHost::children);
            host.context.log
        }
        Flavor::Lldb => {
            let mut host = LldbHost::new(context);
            print_with(&mut host, &v, LldbHost::print_value, LldbHost::children);
            host.context.log
        }
    };
    // Nothing useful to do if stderr is gone.
    let _ = log.dump(&mut io::stderr());
}
