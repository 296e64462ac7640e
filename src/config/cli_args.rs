use clap::Parser;
use std::path::PathBuf;

// pairtestor - 串口对硬件测试
#[derive(Parser, Debug)]
#[clap(
    name = "pairtestor",
    version,
    about = "Run hardware unit tests against a pair of serial ports",
    after_help = "UNIT TESTS:\n  0  Info       Enumeration details of both ports\n  1  Transfer   Byte pattern from source to destination\n  2  Signals    RTS/CTS and DTR/DSR wiring\n\nEXAMPLES:\n  pairtestor --ports\n  pairtestor --enable 1 --enable 2 --list\n  pairtestor --run --src /dev/ttyUSB0 --dst /dev/ttyUSB1\n  pairtestor --run --src COM3 --dst COM4 --break-on-error true --log-file pair.log"
)]
pub struct CliArgs {
    // Settings file holding enable flags and run options
    // 设置文件 - 保存启用状态和运行选项
    #[clap(
        short = 's',
        long = "settings",
        default_value = "pairtestor.toml",
        help = "Settings file"
    )]
    pub settings: PathBuf,

    // Runner configuration file
    // 运行器配置文件
    #[clap(short = 'c', long = "config", help = "Runner configuration file")]
    pub config: Option<PathBuf>,

    // List serial ports available for a pair
    // 列出可用串口
    #[clap(long = "ports", help = "List available serial ports")]
    pub ports: bool,

    // List unit tests and whether they are enabled
    // 列出单元测试
    #[clap(short = 'l', long = "list", help = "List unit tests")]
    pub list: bool,

    // Enable unit tests by id
    // 启用单元测试
    #[clap(long = "enable", value_name = "ID", help = "Enable a unit test (repeatable)")]
    pub enable: Vec<u8>,

    // Disable unit tests by id
    // 禁用单元测试
    #[clap(long = "disable", value_name = "ID", help = "Disable a unit test (repeatable)")]
    pub disable: Vec<u8>,

    // Log file name, relative to the application directory
    // 日志文件名
    #[clap(long = "log-file", value_name = "NAME", help = "Log file name")]
    pub log_file: Option<String>,

    // Truncate the log file when a run starts
    // 开始时清空日志
    #[clap(long = "clear-log-on-start", value_name = "BOOL", help = "Truncate the log on start")]
    pub clear_log_on_start: Option<bool>,

    // Stop the run after the first failed unit test
    // 出错即停止
    #[clap(long = "break-on-error", value_name = "BOOL", help = "Stop after the first failure")]
    pub break_on_error: Option<bool>,

    // Source port of the pair
    // 源串口
    #[clap(long = "src", value_name = "PORT", help = "Source serial port")]
    pub src: Option<String>,

    // Destination port of the pair
    // 目标串口
    #[clap(long = "dst", value_name = "PORT", help = "Destination serial port")]
    pub dst: Option<String>,

    // Start a run of the enabled unit tests
    // 开始运行
    #[clap(
        short = 'r',
        long = "run",
        requires_all = ["src", "dst"],
        help = "Run the enabled unit tests"
    )]
    pub run: bool,

    // Verbose mode - Show more log information
    // 详细模式 - 显示更多日志信息
    #[clap(short = 'v', long = "verbose", help = "Enable verbose logging")]
    pub verbose: bool,

    // Quiet mode - Only show errors
    // 安静模式 - 只显示错误
    #[clap(short = 'q', long = "quiet", help = "Suppress non-essential output")]
    pub quiet: bool,
}

impl CliArgs {
    /// Parse command line arguments
    /// 解析命令行参数
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get log level
    /// 获取日志级别
    pub fn get_log_level(&self) -> &str {
        if self.quiet {
            "error"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// Get the selected pair, if both ports were given
    /// 获取串口对
    pub fn get_pair(&self) -> Option<(&str, &str)> {
        Some((self.src.as_deref()?, self.dst.as_deref()?))
    }
}
