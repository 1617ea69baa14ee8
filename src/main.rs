//! Chips Modkit 命令行入口
//!
//! 合成模块工具包的命令行工具，不连接任何模块运行时。
//!
//! # 命令概览
//!
//! - `generate` - 从描述文件生成模块归档
//! - `inspect` - 查看归档的清单与条目
//! - `vendors` - 解析框架厂商选择串
//! - `check-config` - 验证配置文件
//! - `version` - 显示版本信息
//!
//! # 使用示例
//!
//! ```bash
//! # 生成归档
//! chips-modkit generate -d provider.yaml -o out/
//!
//! # 查看归档
//! chips-modkit inspect out/testCase.provider.jar
//!
//! # 解析厂商选择
//! chips-modkit vendors "felix/1.8.0, equinox"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use chips_modkit::{
    HarnessConfig, Logger, LoggerConfig, ModuleArchive, ModuleParser, RunnerProperties,
    VendorSelection,
};

/// Chips Modkit - 合成模块工具包
#[derive(Parser)]
#[command(name = "chips-modkit")]
#[command(version, about = "合成模块生成与连线校验工具包", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, default_value = "modkit.yaml", global = true)]
    config: PathBuf,

    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 从描述文件生成模块归档
    Generate {
        /// 描述文件（YAML 或 JSON）
        #[arg(short, long)]
        descriptor: PathBuf,

        /// 输出文件或目录，默认写到当前目录下的 `<符号名>.jar`
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 查看归档的清单与条目
    Inspect {
        /// 归档文件
        archive: PathBuf,

        /// 同时展开嵌套归档
        #[arg(long)]
        nested: bool,
    },

    /// 解析框架厂商选择串
    Vendors {
        /// 选择串，不指定则使用配置中的值
        selector: Option<String>,
    },

    /// 验证配置文件
    CheckConfig,

    /// 查看版本信息
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config).await?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    let needs_logging = !matches!(cli.command, Commands::Version | Commands::CheckConfig);
    let _guard = if needs_logging {
        Some(Logger::init(LoggerConfig::from_log_config(&config.logging))?)
    } else {
        None
    };

    match cli.command {
        Commands::Generate { descriptor, output } => {
            generate(&config, &descriptor, output.as_deref()).await?
        }
        Commands::Inspect { archive, nested } => inspect(&archive, nested).await?,
        Commands::Vendors { selector } => vendors(&config, selector.as_deref())?,
        Commands::CheckConfig => check_config(&config)?,
        Commands::Version => print_version(),
    }

    Ok(())
}

/// 加载配置文件，不存在时使用默认配置，随后应用环境变量
async fn load_config(path: &Path) -> Result<HarnessConfig> {
    let mut config = if path.exists() {
        HarnessConfig::from_file(path)
            .await
            .with_context(|| format!("无法加载配置文件 {}", path.display()))?
    } else {
        HarnessConfig::default()
    };
    config.apply_env();
    Ok(config)
}

async fn generate(config: &HarnessConfig, descriptor: &Path, output: Option<&Path>) -> Result<()> {
    config.validate()?;
    let file = ModuleParser::parse_file(descriptor)
        .await
        .with_context(|| format!("无法解析描述文件 {}", descriptor.display()))?;

    let base_dir = descriptor.parent().unwrap_or_else(|| Path::new("."));
    let module = ModuleParser::build(&file, &config.descriptor_factory(), base_dir)?;
    let bytes = module.serialize()?;

    let target = match output {
        Some(path) if path.is_dir() => path.join(module.archive_name()),
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(module.archive_name()),
    };
    tokio::fs::write(&target, &bytes)
        .await
        .with_context(|| format!("无法写入 {}", target.display()))?;

    info!(module = %module.symbolic_name(), path = %target.display(), size = bytes.len(), "Archive generated");
    println!("{}", target.display());
    Ok(())
}

async fn inspect(path: &Path, nested: bool) -> Result<()> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("无法读取 {}", path.display()))?;
    let archive = ModuleArchive::read(&bytes)?;
    print_archive(&archive, 0, nested);
    Ok(())
}

fn print_archive(archive: &ModuleArchive, depth: usize, nested: bool) {
    let indent = "  ".repeat(depth);
    for line in archive.manifest().render().lines() {
        if !line.is_empty() {
            println!("{}{}", indent, line);
        }
    }
    println!("{}────────────────────────────────────────", indent);
    for entry in archive.entries() {
        println!("{}{} ({} bytes)", indent, entry.name, entry.bytes.len());
        if nested && entry.name.ends_with(chips_modkit::module::descriptor::ARCHIVE_SUFFIX) {
            match ModuleArchive::read(&entry.bytes) {
                Ok(inner) => print_archive(&inner, depth + 1, nested),
                Err(e) => warn!(entry = %entry.name, error = %e, "Entry is not a module archive"),
            }
        }
    }
}

fn vendors(config: &HarnessConfig, selector: Option<&str>) -> Result<()> {
    let selection = match selector {
        Some(selector) => VendorSelection::parse(selector),
        None => config
            .vendor_selection()
            .context("未指定厂商选择串，配置中也没有 vendors")?,
    };

    let properties = match config.load_runner_properties() {
        Ok(properties) => properties,
        Err(e) => {
            warn!(error = %e, "Runner properties unavailable, treating all versions as custom");
            RunnerProperties::default()
        }
    };

    let resolved = selection.resolve(&properties, config.definition_dir.as_deref())?;
    println!("{}", serde_json::to_string_pretty(&resolved)?);
    Ok(())
}

fn check_config(config: &HarnessConfig) -> Result<()> {
    match &config.config_path {
        Some(path) => println!("检查配置文件: {}", path.display()),
        None => println!("配置文件不存在，检查默认配置"),
    }
    println!();

    config.validate()?;

    println!("配置有效");
    println!("────────────────────────────────────────");
    println!("  [模块生成]");
    println!("    符号名前缀:     {}", config.name_prefix);
    println!("    默认导入:       {}", config.default_imports);
    println!("    激活器:         {}", config.activator_class);
    println!("    类文件目录:     {}", display_opt(config.class_dir.as_deref()));
    println!();
    println!("  [运行器]");
    println!("    厂商选择:       {}", config.vendors.as_deref().unwrap_or("-"));
    println!("    定义目录:       {}", display_opt(config.definition_dir.as_deref()));
    println!("    依赖列表:       {}", display_opt(config.dependency_file.as_deref()));
    println!("    虚拟机参数:     {}", config.vm_option.as_deref().unwrap_or("-"));
    println!();
    println!("  [日志配置]");
    println!("    日志级别:       {}", config.logging.level);
    println!("    JSON 格式:      {}", if config.logging.json_format { "是" } else { "否" });
    println!("────────────────────────────────────────");
    Ok(())
}

fn display_opt(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn print_version() {
    println!("Chips Modkit {}", chips_modkit::VERSION);
    println!("  目标平台: {}", std::env::consts::ARCH);
    println!("  操作系统: {}", std::env::consts::OS);
}
