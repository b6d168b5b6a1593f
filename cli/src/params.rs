use carve_core::internal::*;
use std::path::PathBuf;

use crate::recipe::Recipe;

/// Structure holding the parsed parameters.
#[derive(Debug, Clone)]
pub struct Parameters {
    pub model: PathBuf,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub splice: SpliceOptions,
    pub prefix: PathBuf,
    pub compile: CompileConfig,
    pub skip_run: bool,
}

fn parse_arg<T>(matches: &clap::ArgMatches, name: &str) -> CarveResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: Into<CarveError>,
{
    matches
        .value_of(name)
        .map(|v| v.parse::<T>().map_err(|e| -> CarveError { e.into() }))
        .transpose()
        .with_context(|| format!("Invalid value for --{name}"))
}

impl Parameters {
    /// Parses the command-line arguments.
    pub fn from_clap(matches: &clap::ArgMatches) -> CarveResult<Parameters> {
        let model = PathBuf::from(matches.value_of("model").context("Model argument required")?);
        ensure!(model.exists(), "Model not found: {:?}", model);

        let recipe = matches.value_of("recipe").map(Recipe::from_path).transpose()?.unwrap_or_default();
        let strategy = match parse_arg::<InputStrategy>(matches, "strategy")? {
            Some(s) => s,
            None => recipe.strategy()?.unwrap_or_default(),
        };
        let mut inputs = recipe.inputs;
        inputs.extend(matches.values_of("input").into_iter().flatten().map(String::from));
        let mut outputs = recipe.outputs;
        outputs.extend(matches.values_of("output").into_iter().flatten().map(String::from));
        ensure!(!outputs.is_empty(), "At least one output tensor is required (--output or --recipe)");

        let batch = if matches.is_present("no-batch") {
            None
        } else {
            Some(parse_arg::<usize>(matches, "batch")?.unwrap_or(16))
        };
        let precision = match matches.value_of("precision") {
            Some("none") => None,
            Some(p) => Some(p.parse::<DatumType>()?),
            None => Some(DatumType::F32),
        };
        let compile = CompileConfig::default()
            .with_layout(matches.value_of("layout").or(Some("NC")).filter(|l| *l != "none"))
            .with_batch(batch)
            .with_num_threads(parse_arg(matches, "threads")?.unwrap_or(4))
            .with_num_streams(parse_arg(matches, "streams")?.unwrap_or(1))
            .with_precision(precision)
            .with_performance_mode(parse_arg(matches, "mode")?.unwrap_or_default())
            .with_profiling(!matches.is_present("no-profile"));

        Ok(Parameters {
            model,
            inputs,
            outputs,
            splice: SpliceOptions::default().with_strategy(strategy),
            prefix: PathBuf::from(matches.value_of("prefix").unwrap_or("simple_model")),
            compile,
            skip_run: matches.is_present("skip-run"),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use temp_dir::TempDir;

    fn parse(dir: &TempDir, args: &[&str]) -> CarveResult<Parameters> {
        let model = dir.child("model.xml");
        fs_err::write(&model, "<net/>")?;
        let mut argv = vec!["carve", model.to_str().context("utf8 path")?];
        argv.extend(args);
        Parameters::from_clap(&crate::command().try_get_matches_from(argv)?)
    }

    #[test]
    fn defaults() -> CarveResult<()> {
        let dir = TempDir::new()?;
        let params = parse(&dir, &["-o", "a:0"])?;
        assert_eq!(params.outputs, vec!["a:0"]);
        assert!(params.inputs.is_empty());
        assert_eq!(params.splice.strategy, InputStrategy::PortOnly);
        assert_eq!(params.prefix, PathBuf::from("simple_model"));
        assert_eq!(params.compile.batch, Some(16));
        assert_eq!(params.compile.layout.as_deref(), Some("NC"));
        assert_eq!(params.compile.num_threads, 4);
        assert_eq!(params.compile.num_streams, 1);
        assert_eq!(params.compile.precision, Some(DatumType::F32));
        assert_eq!(params.compile.performance_mode, PerformanceMode::Throughput);
        assert!(params.compile.enable_profiling);
        assert!(!params.skip_run);
        Ok(())
    }

    #[test]
    fn recipe_and_flags_are_merged() -> CarveResult<()> {
        let dir = TempDir::new()?;
        let recipe = dir.child("recipe.json");
        fs_err::write(&recipe, r#"{ "inputs": ["a:0"], "outputs": ["b:0"], "strategy": "edges" }"#)?;
        let params = parse(
            &dir,
            &["--recipe", recipe.to_str().unwrap(), "-i", "c:1", "-o", "d", "--no-batch", "--mode", "latency"],
        )?;
        assert_eq!(params.inputs, vec!["a:0", "c:1"]);
        assert_eq!(params.outputs, vec!["b:0", "d"]);
        assert_eq!(params.splice.strategy, InputStrategy::AllEdges);
        assert_eq!(params.compile.batch, None);
        assert_eq!(params.compile.performance_mode, PerformanceMode::Latency);
        let params = parse(&dir, &["--recipe", recipe.to_str().unwrap(), "--strategy", "port"])?;
        assert_eq!(params.splice.strategy, InputStrategy::PortOnly);
        Ok(())
    }

    #[test]
    fn outputs_are_required() -> CarveResult<()> {
        let dir = TempDir::new()?;
        assert!(parse(&dir, &["-i", "a:0"]).is_err());
        assert!(parse(&dir, &["-o", "a:0", "--threads", "many"]).is_err());
        Ok(())
    }
}
