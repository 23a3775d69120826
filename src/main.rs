//! Constrained Layout CLI
//!
//! Usage:
//!   constrained-layout inspect <KIND> [OPTIONS]
//!
//! Options:
//!   --size <N>          Array size (RelativeLengthArray, CollinearArray, ...)
//!   --shape <R,C>       Grid shape (Grid, RectilinearGrid)
//!   --side <SIDE>       Side literal (OuterMargin, InnerMargin, PositionXAxis, ...)
//!   --keys <K1,K2,..>   Argument keys (defaults to arg0..argN)
//!   -v, --verbose       Increase log verbosity
//!   -h, --help          Print help

use clap::{ArgAction, Parser, Subcommand};
use tracing::{debug, Level};

use constrained_layout::{describe, Constraint, ConstraintKind, KeyPath, LayoutError, Side};

#[derive(Parser)]
#[command(name = "constrained-layout")]
#[command(about = "Inspect hierarchical layout constraints")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the expansion of a constraint with composed argument keys
    Inspect {
        /// Constraint type name, e.g. Box or Grid
        kind: String,

        /// Array size
        #[arg(long)]
        size: Option<usize>,

        /// Grid shape as ROWS,COLS
        #[arg(long, value_parser = parse_shape)]
        shape: Option<(usize, usize)>,

        /// Side literal: left, right, bottom or top
        #[arg(long)]
        side: Option<String>,

        /// Comma-separated argument keys
        #[arg(long, value_delimiter = ',')]
        keys: Vec<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();

    match cli.command {
        Command::Inspect {
            kind,
            size,
            shape,
            side,
            keys,
        } => {
            let result = side
                .as_deref()
                .map(str::parse::<Side>)
                .transpose()
                .and_then(|side| parse_kind(&kind, size, shape, side))
                .and_then(|kind| inspect(kind, &keys));
            match result {
                Ok(listing) => println!("{}", listing),
                Err(e) => {
                    eprintln!("Error: {}", e.format("<keys>"));
                    std::process::exit(1);
                }
            }
        }
    }
}

fn inspect(kind: ConstraintKind, keys: &[String]) -> Result<String, LayoutError> {
    debug!(kind = %kind, "expanding constraint");
    let constraint = Constraint::new(kind)?;
    let prim_keys = if keys.is_empty() {
        KeyPath::args(constraint.value().signature().arg_types.len())
    } else {
        constrained_layout::keys::parse_keys(keys)?
    };
    describe(&constraint, &prim_keys)
}

fn parse_shape(s: &str) -> Result<(usize, usize), String> {
    let (rows, cols) = s
        .split_once(',')
        .ok_or_else(|| format!("expected ROWS,COLS, got '{}'", s))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<usize>()
            .map_err(|e| format!("invalid grid dimension '{}': {}", v, e))
    };
    Ok((parse(rows)?, parse(cols)?))
}

fn parse_kind(
    name: &str,
    size: Option<usize>,
    shape: Option<(usize, usize)>,
    side: Option<Side>,
) -> Result<ConstraintKind, LayoutError> {
    let need_size = || {
        size.ok_or_else(|| LayoutError::construction(name, "requires --size"))
    };
    let need_shape = || {
        shape.ok_or_else(|| LayoutError::construction(name, "requires --shape"))
    };
    let need_side = || {
        side.ok_or_else(|| LayoutError::construction(name, "requires --side"))
    };

    let kind = match name {
        "Fix" => ConstraintKind::Fix,
        "DirectedDistance" => ConstraintKind::DirectedDistance,
        "XDistance" => ConstraintKind::XDistance,
        "YDistance" => ConstraintKind::YDistance,
        "Coincident" => ConstraintKind::Coincident,
        "Length" => ConstraintKind::Length,
        "DirectedLength" => ConstraintKind::DirectedLength,
        "XLength" => ConstraintKind::XLength,
        "YLength" => ConstraintKind::YLength,
        "Vertical" => ConstraintKind::Vertical,
        "Horizontal" => ConstraintKind::Horizontal,
        "RelativeLength" => ConstraintKind::RelativeLength,
        "MidpointXDistance" => ConstraintKind::MidpointXDistance,
        "MidpointYDistance" => ConstraintKind::MidpointYDistance,
        "Orthogonal" => ConstraintKind::Orthogonal,
        "Parallel" => ConstraintKind::Parallel,
        "Angle" => ConstraintKind::Angle,
        "Collinear" => ConstraintKind::Collinear,
        "CoincidentLines" => ConstraintKind::CoincidentLines,
        "PointOnLineDistance" => ConstraintKind::PointOnLineDistance,
        "PointToLineDistance" => ConstraintKind::PointToLineDistance,
        "RelativePointOnLineDistance" => ConstraintKind::RelativePointOnLineDistance,
        "Box" => ConstraintKind::Box,
        "AspectRatio" => ConstraintKind::AspectRatio,
        "OuterMargin" => ConstraintKind::OuterMargin { side: need_side()? },
        "InnerMargin" => ConstraintKind::InnerMargin { side: need_side()? },
        "RelativeLengthArray" => ConstraintKind::RelativeLengthArray { size: need_size()? },
        "MidpointXDistanceArray" => ConstraintKind::MidpointXDistanceArray { size: need_size()? },
        "MidpointYDistanceArray" => ConstraintKind::MidpointYDistanceArray { size: need_size()? },
        "CollinearArray" => ConstraintKind::CollinearArray { size: need_size()? },
        "RectilinearGrid" => {
            let (rows, cols) = need_shape()?;
            ConstraintKind::RectilinearGrid { rows, cols }
        }
        "Grid" => {
            let (rows, cols) = need_shape()?;
            ConstraintKind::Grid { rows, cols }
        }
        "XAxisHeight" => ConstraintKind::XAxisHeight,
        "YAxisWidth" => ConstraintKind::YAxisWidth,
        "PositionXAxis" => ConstraintKind::PositionXAxis { side: need_side()? },
        "PositionYAxis" => ConstraintKind::PositionYAxis { side: need_side()? },
        "PositionXAxisLabel" => ConstraintKind::PositionXAxisLabel,
        "PositionYAxisLabel" => ConstraintKind::PositionYAxisLabel,
        other => {
            return Err(LayoutError::construction(
                "constraint type",
                format!("'{}' is not a known constraint", other),
            ))
        }
    };
    Ok(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shape() {
        assert_eq!(parse_shape("2,3").unwrap(), (2, 3));
        assert_eq!(parse_shape(" 1 , 4").unwrap(), (1, 4));
        assert!(parse_shape("2x3").is_err());
    }

    #[test]
    fn test_parse_kind_constants() {
        assert_eq!(
            parse_kind("Grid", None, Some((2, 2)), None).unwrap(),
            ConstraintKind::Grid { rows: 2, cols: 2 }
        );
        assert!(parse_kind("Grid", Some(3), None, None).is_err());
        assert!(parse_kind("Triangle", None, None, None).is_err());
    }

    #[test]
    fn test_inspect_default_keys() {
        let listing = inspect(ConstraintKind::CollinearArray { size: 2 }, &[]).unwrap();
        assert!(listing.contains("Collinear[0][1]: Collinear (arg0, arg1) res=2"));
    }
}
