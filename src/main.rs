use std::{
    fs::File,
    io::{self, Read, Write},
    process::ExitCode,
    sync::Arc,
};

use clap::{Parser, Subcommand};
use tracing::{error, info, span, Level};
use tracing_subscriber::EnvFilter;

use objectfs_oss::{
    model::{fs::Visibility, options::Config},
    util, AdapterConfig, Filesystem, ObjectFS,
};

/// Filesystem verbs over an S3-compatible object storage bucket.
#[derive(Debug, Parser)]
#[command(name = "objectfs-oss", version)]
struct Args {
    /// Bucket URI, `s3://bucket/prefix`; overrides --bucket and --prefix
    #[arg(long)]
    uri: Option<String>,

    #[arg(long, env = "OSS_BUCKET", required_unless_present = "uri")]
    bucket: Option<String>,

    /// Public endpoint host used for generated URLs
    #[arg(long, env = "OSS_ENDPOINT")]
    endpoint: String,

    /// Request endpoint for the S3 client, when it differs from the SDK default
    #[arg(long, env = "OSS_ENDPOINT_URL")]
    endpoint_url: Option<String>,

    #[arg(long, env = "OSS_SSL")]
    ssl: bool,

    #[arg(long, env = "OSS_IS_CNAME")]
    cname: bool,

    #[arg(long, env = "OSS_CDN_DOMAIN", default_value = "")]
    cdn_domain: String,

    #[arg(long, env = "OSS_PREFIX")]
    prefix: Option<String>,

    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Ls {
        #[arg(default_value = "")]
        directory: String,
        #[arg(short, long)]
        recursive: bool,
    },
    Put {
        path: String,
        /// Local file, or `-` for stdin
        source: String,
        #[arg(long, conflicts_with = "private")]
        public: bool,
        #[arg(long)]
        private: bool,
        #[arg(long)]
        content_type: Option<String>,
        /// Keep the current ACL of an existing object
        #[arg(long)]
        update: bool,
    },
    Cat {
        path: String,
    },
    Stat {
        path: String,
    },
    Rm {
        path: String,
    },
    Rmdir {
        directory: String,
    },
    Mkdir {
        directory: String,
    },
    Mv {
        from: String,
        to: String,
    },
    Cp {
        from: String,
        to: String,
    },
    Chmod {
        path: String,
        visibility: Visibility,
    },
    Url {
        path: String,
    },
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn build_config(args: &Args) -> Result<AdapterConfig, String> {
    let (bucket, prefix) = match &args.uri {
        Some(uri) => util::object::parse_bucket_uri(uri).map_err(|err| err.to_string())?,
        None => (
            args.bucket.clone().ok_or("missing --bucket")?,
            args.prefix.clone(),
        ),
    };

    let mut config = AdapterConfig::new(&bucket, &args.endpoint)
        .ssl(args.ssl)
        .prefix(prefix.as_deref());

    if args.cname {
        config = config.cname(&args.cdn_domain);
    }

    Ok(config)
}

fn open_source(source: &str) -> io::Result<Box<dyn Read>> {
    if source == "-" {
        Ok(Box::new(io::stdin()))
    } else {
        Ok(Box::new(File::open(source)?))
    }
}

fn report(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn run(fs: &ObjectFS, command: Command) -> io::Result<ExitCode> {
    let mut out = io::stdout().lock();

    let code = match command {
        Command::Ls {
            directory,
            recursive,
        } => {
            for entry in fs.list_contents(&directory, recursive) {
                writeln!(
                    out,
                    "{}\t{}\t{}",
                    entry.kind,
                    entry.size.map(|s| s.to_string()).unwrap_or_default(),
                    entry.path
                )?;
            }
            ExitCode::SUCCESS
        }
        Command::Put {
            path,
            source,
            public,
            private,
            content_type,
            update,
        } => {
            let mut config = Config::new();
            if public {
                config = config.with_visibility(Visibility::Public);
            } else if private {
                config = config.with_visibility(Visibility::Private);
            }
            if let Some(content_type) = content_type {
                config = config.with("mimetype", content_type);
            }

            let mut resource = open_source(&source)?;
            let meta = if update {
                fs.update_stream(&path, &mut resource, &config)
            } else {
                fs.write_stream(&path, &mut resource, &config)
            };

            if let Some(meta) = &meta {
                writeln!(out, "{}\t{}", meta.path, meta.size.unwrap_or(0))?;
            }
            report(meta.is_some())
        }
        Command::Cat { path } => match fs.read_stream(&path) {
            Some(mut file) => {
                io::copy(&mut file.stream, &mut out)?;
                ExitCode::SUCCESS
            }
            None => ExitCode::FAILURE,
        },
        Command::Stat { path } => match fs.get_metadata(&path) {
            Some(meta) => {
                writeln!(out, "path\t{}", meta.path)?;
                writeln!(out, "type\t{}", meta.kind)?;
                writeln!(out, "size\t{}", meta.size.unwrap_or(0))?;
                writeln!(out, "mimetype\t{}", meta.mimetype.unwrap_or_default())?;
                writeln!(out, "timestamp\t{}", meta.timestamp.unwrap_or(0))?;
                writeln!(out, "storage_class\t{}", meta.storage_class.unwrap_or_default())?;
                if let Some(visibility) = fs.get_visibility(&path) {
                    writeln!(out, "visibility\t{}", visibility)?;
                }
                ExitCode::SUCCESS
            }
            None => ExitCode::FAILURE,
        },
        Command::Rm { path } => report(fs.delete(&path)),
        Command::Rmdir { directory } => report(fs.delete_dir(&directory)),
        Command::Mkdir { directory } => report(fs.create_dir(&directory, &Config::new()).is_some()),
        Command::Mv { from, to } => report(fs.rename(&from, &to)),
        Command::Cp { from, to } => report(fs.copy(&from, &to)),
        Command::Chmod { path, visibility } => {
            report(fs.set_visibility(&path, visibility).is_some())
        }
        Command::Url { path } => match fs.get_url(&path) {
            Ok(url) => {
                writeln!(out, "{}", url)?;
                ExitCode::SUCCESS
            }
            Err(err) => {
                error!(error_message=%err, error_group="get_url");
                eprintln!("{}", err);
                ExitCode::FAILURE
            }
        },
    };

    Ok(code)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.debug);

    let span = span!(Level::INFO, "main", context = "main");
    let _e = span.enter();
    info!("called");

    let config = match build_config(&args) {
        Err(err) => {
            error!(error_message=%err, error_group="config");
            eprintln!("{}", err);
            return ExitCode::from(2);
        }
        Ok(config) => config,
    };
    info!(bucket=%config.bucket, endpoint=%config.endpoint, prefix=?config.prefix, "args");

    let sdk_config = util::poll::poll_until_ready(aws_config::load_from_env());
    let mut s3_config = aws_sdk_s3::config::Builder::from(&sdk_config);
    if let Some(endpoint_url) = &args.endpoint_url {
        s3_config = s3_config.endpoint_url(endpoint_url);
    }
    let client = aws_sdk_s3::Client::from_conf(s3_config.build());

    let fs = ObjectFS::new(Arc::new(client), config);

    match run(&fs, args.command) {
        Err(err) => {
            error!(error_message=%err, error_group="io");
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
        Ok(code) => code,
    }
}
