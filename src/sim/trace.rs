// trace files: one per processor, one access per line
//
//   0 0x1f40     load
//   1 0x1f40     store
//   2 25         25 cycles of other work

use std::fs;
use std::path::{Path, PathBuf};

use super::common::*;
use crate::protocol::Addr;

pub const TRACE_EXT: &str = "trace";

/// Reads every `*.trace` file in `dir`, ordered by file name. Processor `i`
/// replays the `i`-th file.
pub fn read_trace_dir(dir: &Path) -> Result<Vec<Insts>, SimError> {
    let io_err = |source| SimError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = fs::read_dir(dir)
        .map_err(io_err)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == TRACE_EXT))
        .collect::<Vec<_>>();
    if paths.is_empty() {
        return Err(SimError::NoTraces(dir.to_path_buf()));
    }
    paths.sort();

    let mut traces = Vec::with_capacity(paths.len());
    for path in paths {
        info!("reading trace {}", path.display());
        let src = fs::read_to_string(&path).map_err(|source| SimError::Io {
            path: path.clone(),
            source,
        })?;
        traces.push(parse_trace(&path, &src)?);
    }
    Ok(traces)
}

pub fn parse_trace(path: &Path, src: &str) -> Result<Insts, SimError> {
    let mut insts = Insts::new();
    for (i, raw) in src.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let err = |reason: String| SimError::Parse {
            path: PathBuf::from(path),
            line: i + 1,
            reason,
        };
        let mut parts = line.split_whitespace();
        let (Some(op), Some(val), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(err(format!("expected `<op> <value>`, got `{line}`")));
        };
        let inst = match op {
            "0" => Instr::Load(parse_addr(val).map_err(err)?),
            "1" => Instr::Store(parse_addr(val).map_err(err)?),
            "2" => Instr::Other(
                val.parse()
                    .map_err(|e| err(format!("bad cycle count `{val}`: {e}")))?,
            ),
            _ => return Err(err(format!("unknown op `{op}`"))),
        };
        insts.push_back(inst);
    }
    Ok(insts)
}

fn parse_addr(val: &str) -> Result<Addr, String> {
    let digits = val
        .strip_prefix("0x")
        .or_else(|| val.strip_prefix("0X"))
        .unwrap_or(val);
    u64::from_str_radix(digits, 16)
        .map(Addr)
        .map_err(|e| format!("bad address `{val}`: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ops_and_skips_comments() {
        let src = "# warmup\n0 0x40\n\n1 80   # store\n2 7\n";
        let insts = parse_trace(Path::new("p0.trace"), src).unwrap();
        assert_eq!(
            insts,
            Insts::from(vec![
                Instr::Load(Addr(0x40)),
                Instr::Store(Addr(0x80)),
                Instr::Other(7),
            ])
        );
    }

    #[test]
    fn reports_line_of_bad_entry() {
        let err = parse_trace(Path::new("p1.trace"), "0 0x40\n3 0x40\n").unwrap_err();
        match err {
            SimError::Parse { line, reason, .. } => {
                assert_eq!(line, 2);
                assert!(reason.contains("unknown op"));
            }
            other => panic!("unexpected error {other}"),
        }
        assert!(parse_trace(Path::new("p1.trace"), "0 zz\n").is_err());
        assert!(parse_trace(Path::new("p1.trace"), "0\n").is_err());
    }
}
