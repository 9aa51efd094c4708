use std::process::exit;
use std::time::Instant;

use log::error;

use striped_word_count::logging::{log_level, set_logger_or_exit};
use striped_word_count::util::*;
use striped_word_count::{run_files, PipelineConfig};

fn main() {
    let conf = parse_args("word count: batched map-reduce over a striped global table");
    set_logger_or_exit(&conf.log_stream, log_level(conf.verbose));

    let (start_usr_time, start_sys_time) = get_cputime_usecs();
    let start_time = Instant::now();

    let pipeline_conf = PipelineConfig::from(&conf);
    let stats = match run_files(&pipeline_conf, &conf.input, &conf.alpha_output, &conf.freq_output) {
        Ok(stats) => stats,
        Err(err) => {
            error!("{}", err);
            if conf.log_stream != "-" {
                eprintln!("{}", err);
            }
            exit(1);
        }
    };
    stats.log_summary();

    let difference = start_time.elapsed();
    let (end_usr_time, end_sys_time) = get_cputime_usecs();
    let usr_time = (end_usr_time - start_usr_time) as f64 / 1_000_000.0;
    let sys_time = (end_sys_time - start_sys_time) as f64 / 1_000_000.0;
    eprintln!("walltime: {:?} (usr: {:.3}s sys: {:.3}s)", difference, usr_time, sys_time);
}
