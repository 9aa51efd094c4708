use argparse::{ArgumentParser, Print, Store, StoreTrue};
use std::collections::HashMap;
use std::io::{self, Write};
use std::process::exit;

use bytes::Bytes;
use libc::{getrusage, rusage, RUSAGE_SELF};

pub type FreqTable = HashMap<Bytes, u64>;

/// One (word, count) pair of the final result.
pub type Entry = (Bytes, u64);

pub const DEFAULT_BATCH_SIZE: usize = 1_000_000;
pub const DEFAULT_ALPHA_OUTPUT: &str = "word_counts_alpha.txt";
pub const DEFAULT_FREQ_OUTPUT: &str = "word_counts_freq.txt";

pub fn get_cputime_usecs() -> (u64, u64) {
    let mut usage: rusage = unsafe { std::mem::zeroed() };

    unsafe {
        getrusage(RUSAGE_SELF, &mut usage as *mut rusage);
    }

    let u_time = (usage.ru_utime.tv_sec as u64 * 1_000_000) + usage.ru_utime.tv_usec as u64;
    let s_time = (usage.ru_stime.tv_sec as u64 * 1_000_000) + usage.ru_stime.tv_usec as u64;

    (u_time, s_time)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub input: String,
    pub alpha_output: String,
    pub freq_output: String,
    pub log_stream: String,
    pub verbose: bool,
    pub threads: usize,
    pub stripes: usize,
    pub batch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            input: String::new(),
            alpha_output: DEFAULT_ALPHA_OUTPUT.to_owned(),
            freq_output: DEFAULT_FREQ_OUTPUT.to_owned(),
            log_stream: "-".to_owned(),
            verbose: false,
            threads: 0,
            stripes: 0,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Parses `args` (program name first). On failure returns the exit code:
/// 0 after `--help`/`--version`, 1 for a usage error.
pub fn parse_args_from(
    description: &str,
    args: Vec<String>,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<Config, i32> {
    let mut conf = Config::default();

    let res = {
        // this block limits scope of borrows by ap.refer() method
        let mut ap = ArgumentParser::new();

        ap.set_description(description);
        ap.add_option(
            &["-V", "--version"],
            Print(env!("CARGO_PKG_VERSION").to_string()),
            "Show version",
        );

        ap.refer(&mut conf.input)
            .add_argument("input", Store, "input file")
            .required();

        ap.refer(&mut conf.threads).add_option(
            &["-t", "--threads"],
            Store,
            "thread count - default: 0 (hardware parallelism)",
        );

        ap.refer(&mut conf.batch_size).add_option(
            &["-b", "--batch-size"],
            Store,
            "lines per batch - default: 1000000",
        );

        ap.refer(&mut conf.stripes).add_option(
            &["-s", "--stripes"],
            Store,
            "lock stripes of the global table - default: 0 (thread count)",
        );

        ap.refer(&mut conf.alpha_output).add_option(
            &["--alpha-out"],
            Store,
            "alphabetical output file - default: word_counts_alpha.txt",
        );

        ap.refer(&mut conf.freq_output).add_option(
            &["--freq-out"],
            Store,
            "frequency output file - default: word_counts_freq.txt",
        );

        ap.refer(&mut conf.log_stream).add_option(
            &["-l", "--log"],
            Store,
            "log file - default: - (stderr)",
        );

        ap.refer(&mut conf.verbose)
            .add_option(&["-v", "--verbose"], StoreTrue, "debug logging");

        ap.parse(args, stdout, stderr)
    };

    match res {
        Ok(()) => Ok(conf),
        Err(0) => Err(0),
        Err(_) => Err(1),
    }
}

pub fn parse_args(description: &str) -> Config {
    let stdout = io::stdout();
    let stderr = io::stderr();
    let res = parse_args_from(
        description,
        std::env::args().collect(),
        &mut stdout.lock(),
        &mut stderr.lock(),
    );
    match res {
        Ok(conf) => conf,
        Err(code) => exit(code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Config, i32> {
        let mut args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        args.insert(0, "wc-striped".to_owned());
        parse_args_from("test", args, &mut io::sink(), &mut io::sink())
    }

    #[test]
    fn single_input_uses_defaults() {
        let conf = parse(&["corpus.txt"]).unwrap();
        assert_eq!(conf.input, "corpus.txt");
        assert_eq!(conf.threads, 0);
        assert_eq!(conf.stripes, 0);
        assert_eq!(conf.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(conf.alpha_output, DEFAULT_ALPHA_OUTPUT);
        assert_eq!(conf.freq_output, DEFAULT_FREQ_OUTPUT);
        assert_eq!(conf.log_stream, "-");
        assert!(!conf.verbose);
    }

    #[test]
    fn options_override_defaults() {
        let conf = parse(&[
            "-t", "3", "-b", "100", "-s", "7", "--alpha-out", "a.txt", "--freq-out", "f.txt", "-v",
            "in.txt",
        ])
        .unwrap();
        assert_eq!(conf.threads, 3);
        assert_eq!(conf.batch_size, 100);
        assert_eq!(conf.stripes, 7);
        assert_eq!(conf.alpha_output, "a.txt");
        assert_eq!(conf.freq_output, "f.txt");
        assert!(conf.verbose);
        assert_eq!(conf.input, "in.txt");
    }

    #[test]
    fn wrong_argument_count_is_a_usage_error() {
        assert_eq!(parse(&[]), Err(1));
        assert_eq!(parse(&["a.txt", "b.txt"]), Err(1));
        assert_eq!(parse(&["-t", "many", "a.txt"]), Err(1));
    }

    #[test]
    fn help_exits_cleanly() {
        assert_eq!(parse(&["--help"]), Err(0));
    }

    #[test]
    fn cputime_is_monotonic() {
        let (usr_a, sys_a) = get_cputime_usecs();
        let mut acc = 0u64;
        for i in 0..100_000u64 {
            acc = acc.wrapping_add(i * i);
        }
        assert!(acc > 0);
        let (usr_b, sys_b) = get_cputime_usecs();
        assert!(usr_b >= usr_a);
        assert!(sys_b >= sys_a);
    }
}
