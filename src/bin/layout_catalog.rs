//! Command-line front end for the layout catalog.
//!
//! `build` runs in authoring mode and writes a snapshot; the read commands
//! (`keys`, `values`, `filter`, `export`) run in user mode against the latest
//! snapshot in the snapshot directory. Tables are printed as NDJSON, one
//! object per row, so output can be piped into other tools.

use anyhow::{Context, Result, bail};
use dataset_catalog::runtime::{CatalogSettings, init_logging};
use dataset_catalog::{LayoutCatalog, Table, parse_entity_filters, split_list};
use std::env;
use std::io::{self, Write};
use std::path::PathBuf;

fn main() {
    init_logging();
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse(env::args().skip(1).collect())?;
    match cli.command {
        Command::Build {
            project,
            root,
            layout,
            out_dir,
        } => {
            let settings = CatalogSettings::resolve(cli.conf, None)?;
            let mut catalog = LayoutCatalog::new(&project, &settings.config_dir, None)?;
            let subset = cli.subset.as_deref().map(split_list);
            let outfile = catalog
                .build_and_persist(&root, &layout, &out_dir, subset.as_deref())
                .with_context(|| format!("building '{layout}' for project '{project}'"))?;
            println!("{}", outfile.display());
        }
        Command::Keys { project, layout } => {
            let mut catalog = open_user_catalog(&project, cli.conf, cli.snapshots)?;
            for key in catalog.list_keys(&layout)? {
                println!("{key}");
            }
        }
        Command::Values {
            project,
            layout,
            key,
        } => {
            let mut catalog = open_user_catalog(&project, cli.conf, cli.snapshots)?;
            for value in catalog.list_values(&layout, &key)? {
                println!("{value}");
            }
        }
        Command::Filter {
            project,
            layout,
            filters,
        } => {
            let mut catalog = open_user_catalog(&project, cli.conf, cli.snapshots)?;
            let filters = parse_entity_filters(&filters)?;
            let extensions: Vec<&str> = cli.extensions.iter().map(String::as_str).collect();
            let extension = (!extensions.is_empty()).then_some(extensions.as_slice());
            let table = catalog.filter(&layout, extension, filters)?;
            print_ndjson(&table)?;
        }
        Command::Export { project, layout } => {
            let mut catalog = open_user_catalog(&project, cli.conf, cli.snapshots)?;
            print_ndjson(&catalog.export_layout(&layout)?)?;
        }
    }
    Ok(())
}

fn open_user_catalog(
    project: &str,
    conf: Option<PathBuf>,
    snapshots: Option<PathBuf>,
) -> Result<LayoutCatalog> {
    let settings = CatalogSettings::resolve(conf, snapshots)?;
    let Some(snapshot_dir) = settings.snapshot_dir.as_deref() else {
        bail!("Read commands need --snapshots or CATALOG_SNAPSHOT_DIR");
    };
    Ok(LayoutCatalog::new(
        project,
        &settings.config_dir,
        Some(snapshot_dir),
    )?)
}

fn print_ndjson(table: &Table) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for row in table.rows() {
        serde_json::to_writer(&mut out, row)?;
        out.write_all(b"\n")?;
    }
    Ok(())
}

enum Command {
    Build {
        project: String,
        root: PathBuf,
        layout: String,
        out_dir: PathBuf,
    },
    Keys {
        project: String,
        layout: String,
    },
    Values {
        project: String,
        layout: String,
        key: String,
    },
    Filter {
        project: String,
        layout: String,
        filters: Vec<String>,
    },
    Export {
        project: String,
        layout: String,
    },
}

struct Cli {
    command: Command,
    conf: Option<PathBuf>,
    snapshots: Option<PathBuf>,
    subset: Option<String>,
    extensions: Vec<String>,
}

impl Cli {
    fn parse(args: Vec<String>) -> Result<Self> {
        let mut conf = None;
        let mut snapshots = None;
        let mut subset = None;
        let mut extensions = Vec::new();
        let mut positional = Vec::new();

        let mut iter = args.into_iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--conf" => conf = Some(PathBuf::from(next_value(&mut iter, "--conf")?)),
                "--snapshots" => {
                    snapshots = Some(PathBuf::from(next_value(&mut iter, "--snapshots")?))
                }
                "--subset" => subset = Some(next_value(&mut iter, "--subset")?),
                "--ext" => extensions.extend(split_list(&next_value(&mut iter, "--ext")?)),
                "--help" | "-h" => usage(0),
                other if other.starts_with("--") => bail!("Unknown flag: {other}"),
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let Some(name) = positional.next() else {
            usage(1);
        };
        let mut take = |what: &str| take_positional(&mut positional, &name, what);
        let command = match name.as_str() {
            "build" => Command::Build {
                project: take("project")?,
                root: PathBuf::from(take("root")?),
                layout: take("layout")?,
                out_dir: PathBuf::from(take("out_dir")?),
            },
            "keys" => Command::Keys {
                project: take("project")?,
                layout: take("layout")?,
            },
            "values" => Command::Values {
                project: take("project")?,
                layout: take("layout")?,
                key: take("key")?,
            },
            "filter" => Command::Filter {
                project: take("project")?,
                layout: take("layout")?,
                filters: {
                    let mut rest = Vec::new();
                    while let Ok(filter) = take("key=value") {
                        rest.push(filter);
                    }
                    rest
                },
            },
            "export" => Command::Export {
                project: take("project")?,
                layout: take("layout")?,
            },
            other => bail!("Unknown command: {other}"),
        };

        Ok(Self {
            command,
            conf,
            snapshots,
            subset,
            extensions,
        })
    }
}

fn take_positional(
    positional: &mut impl Iterator<Item = String>,
    command: &str,
    what: &str,
) -> Result<String> {
    positional
        .next()
        .with_context(|| format!("{command}: missing <{what}>"))
}

fn next_value(iter: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    iter.next()
        .with_context(|| format!("{flag} requires a value"))
}

fn usage(code: i32) -> ! {
    eprintln!(
        "Usage: layout-catalog <command> [--conf DIR] [--snapshots DIR] [args]\n\nCommands:\n  build <project> <root> <layout> <out_dir> [--subset a,b]\n                 Index <root>/<layout> and write a dated snapshot into <out_dir>.\n  keys <project> <layout>\n                 List entity keys of the latest snapshot.\n  values <project> <layout> <key>\n                 List distinct values of one entity.\n  filter <project> <layout> [--ext nii.gz] [key=value ...]\n                 Print matching files as NDJSON rows.\n  export <project> <layout>\n                 Print the whole layout as NDJSON rows.\n\nEnvironment:\n  CATALOG_CONF_DIR, CATALOG_SNAPSHOT_DIR   defaults for --conf / --snapshots\n  RUST_LOG                                 log filter (default: warn)"
    );
    std::process::exit(code);
}
