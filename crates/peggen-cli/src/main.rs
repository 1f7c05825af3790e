use std::path::{Path, PathBuf};

use peggen::{compile, EmitNames, ErrorAccumulator, Source};

const USAGE: &str = "\
usage: peggen [options] <input-file>

  -h, --help             Print usage.
  -o <output>            Output source path.
  --                     End of options.
  <input-file>           Grammar file; \"-\" means stdin.";

trait IoError<T> {
    fn pretty_error(self, path: &Path, message: &str) -> Result<T, ()>;
}

impl<T> IoError<T> for std::io::Result<T> {
    fn pretty_error(self, path: &Path, message: &str) -> Result<T, ()> {
        self.map_err(|e| {
            let path = path.display();
            eprintln!("{message} `{path}`\n  {e}");
        })
    }
}

fn main() {
    if run().is_err() {
        std::process::exit(1);
    }
}

struct Options {
    input: PathBuf,
    output: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<Option<Options>, ()> {
    let mut output: Option<PathBuf> = None;
    let mut input: Option<PathBuf> = None;
    let mut options_done = false;
    let mut iter = args.iter().map(String::as_str);
    while let Some(arg) = iter.next() {
        if !options_done && arg.starts_with('-') && arg != "-" {
            match arg {
                "-h" | "--help" => {
                    println!("{USAGE}");
                    return Ok(None);
                }
                "-o" => {
                    let Some(path) = iter.next() else {
                        eprintln!("missing argument to -o");
                        return Err(());
                    };
                    if output.replace(path.into()).is_some() {
                        eprintln!("-o may only be given once");
                        return Err(());
                    }
                }
                "--" => options_done = true,
                _ => {
                    eprintln!("unknown option `{arg}`\n{USAGE}");
                    return Err(());
                }
            }
        } else if input.replace(arg.into()).is_some() {
            eprintln!("only one input file may be provided");
            return Err(());
        }
    }
    let Some(input) = input else {
        eprintln!("no input file provided\n{USAGE}");
        return Err(());
    };
    Ok(Some(Options { input, output }))
}

/// The output source path keeps an explicit `.cpp` extension or has
/// one appended; without `-o` it is the input path with its extension
/// replaced.
fn source_output_path(options: &Options) -> Result<PathBuf, ()> {
    match &options.output {
        Some(path) => {
            if path.extension().is_some_and(|e| e == "cpp") {
                Ok(path.clone())
            } else {
                let mut with_extension = path.clone().into_os_string();
                with_extension.push(".cpp");
                Ok(PathBuf::from(with_extension))
            }
        }
        None if options.input.as_os_str() == "-" => {
            eprintln!("-o is required when reading from standard input");
            Err(())
        }
        None => Ok(options.input.with_extension("cpp")),
    }
}

fn report_diagnostics(source: &Source, err: &ErrorAccumulator) {
    for diagnostic in err.take() {
        let level = diagnostic.severity.as_str();
        match diagnostic.span {
            Some(span) => eprintln!(
                "{}: {}: {}",
                source.location_string(span.start()),
                level,
                diagnostic.message
            ),
            None => eprintln!("{}: {}", level, diagnostic.message),
        }
    }
}

fn run() -> Result<(), ()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(options) = parse_args(&args)? else {
        return Ok(());
    };

    let source_path = source_output_path(&options)?;
    let header_path = source_path.with_extension("h");
    let header_name_from_source = header_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let source = Source::load(&options.input)
        .pretty_error(&options.input, "can't open file")?;

    let err = ErrorAccumulator::new();
    let names = EmitNames {
        source_file_name: source_path.display().to_string(),
        header_file_name: header_path.display().to_string(),
        header_name_from_source,
    };
    let output = compile(&source, &names, &err);
    let any_errors = err.has_errors();
    let any_reported = err.any_reported();
    report_diagnostics(&source, &err);

    let Some(output) = output.filter(|_| !any_errors) else {
        return Err(());
    };
    std::fs::write(&source_path, output.source).pretty_error(&source_path, "can't write file")?;
    std::fs::write(&header_path, output.header).pretty_error(&header_path, "can't write file")?;

    if any_reported {
        return Err(());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(input: &str, output: Option<&str>) -> Options {
        Options {
            input: input.into(),
            output: output.map(PathBuf::from),
        }
    }

    #[test]
    fn output_defaults_to_input_with_cpp_extension() {
        let path = source_output_path(&options("dir/lang.peg", None)).unwrap();
        assert_eq!(path, PathBuf::from("dir/lang.cpp"));
    }

    #[test]
    fn explicit_output_keeps_cpp_extension() {
        let path = source_output_path(&options("g.peg", Some("out/parser.cpp"))).unwrap();
        assert_eq!(path, PathBuf::from("out/parser.cpp"));
    }

    #[test]
    fn explicit_output_without_extension_gains_one() {
        let path = source_output_path(&options("g.peg", Some("out/parser"))).unwrap();
        assert_eq!(path, PathBuf::from("out/parser.cpp"));
        let path = source_output_path(&options("g.peg", Some("out/parser.txt"))).unwrap();
        assert_eq!(path, PathBuf::from("out/parser.txt.cpp"));
    }

    #[test]
    fn stdin_requires_explicit_output() {
        assert!(source_output_path(&options("-", None)).is_err());
        assert!(source_output_path(&options("-", Some("p"))).is_ok());
    }

    #[test]
    fn header_path_replaces_extension() {
        let source = source_output_path(&options("lang.peg", None)).unwrap();
        assert_eq!(source.with_extension("h"), PathBuf::from("lang.h"));
    }

    #[test]
    fn args_parse_options_and_positional() {
        let args: Vec<String> = ["-o", "out", "grammar.peg"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let options = parse_args(&args).unwrap().unwrap();
        assert_eq!(options.input, PathBuf::from("grammar.peg"));
        assert_eq!(options.output, Some(PathBuf::from("out")));
    }

    #[test]
    fn double_dash_ends_options() {
        let args: Vec<String> = ["--", "-weird"].iter().map(|s| s.to_string()).collect();
        let options = parse_args(&args).unwrap().unwrap();
        assert_eq!(options.input, PathBuf::from("-weird"));
    }

    #[test]
    fn lone_dash_is_stdin_input() {
        let args: Vec<String> = ["-o", "out", "-"].iter().map(|s| s.to_string()).collect();
        let options = parse_args(&args).unwrap().unwrap();
        assert_eq!(options.input, PathBuf::from("-"));
    }

    #[test]
    fn rejects_two_inputs_and_unknown_options() {
        let args: Vec<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        assert!(parse_args(&args).is_err());
        let args: Vec<String> = ["-x"].iter().map(|s| s.to_string()).collect();
        assert!(parse_args(&args).is_err());
    }
}
