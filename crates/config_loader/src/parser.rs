//! 配置文本解析
//!
//! TOML 为默认格式，JSON 供脚本生成的配置使用。解析错误带上行列号。

use contracts::{ContractError, TurbineConfig};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    const ALL: [ConfigFormat; 2] = [ConfigFormat::Toml, ConfigFormat::Json];

    /// 按扩展名识别，不区分大小写
    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|format| ext.eq_ignore_ascii_case(format.extension()))
    }

    /// 对应的文件扩展名
    pub fn extension(self) -> &'static str {
        match self {
            Self::Toml => "toml",
            Self::Json => "json",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
        }
    }
}

/// 按指定格式把文本解析为 TurbineConfig（不做校验）
pub fn parse(content: &str, format: ConfigFormat) -> Result<TurbineConfig, ContractError> {
    let parsed = match format {
        ConfigFormat::Toml => toml::from_str::<TurbineConfig>(content).map_err(|e| {
            let at = e.span().map(|span| line_col(content, span.start));
            (at, e.message().to_string(), boxed(e))
        }),
        // serde_json already appends the position to its message
        ConfigFormat::Json => serde_json::from_str::<TurbineConfig>(content)
            .map_err(|e| (None, e.to_string(), boxed(e))),
    };

    parsed.map_err(|(at, detail, source)| {
        let message = match at {
            Some((line, col)) => format!("{} error at line {line}, column {col}: {detail}", format.label()),
            None => format!("{} error: {detail}", format.label()),
        };
        ContractError::ConfigParse {
            message,
            source: Some(source),
        }
    })
}

fn boxed<E>(e: E) -> Box<dyn std::error::Error + Send + Sync>
where
    E: std::error::Error + Send + Sync + 'static,
{
    Box::new(e)
}

/// 字节偏移 -> 1 起始的 (行, 列)
fn line_col(content: &str, offset: usize) -> (usize, usize) {
    let before = &content[..offset.min(content.len())];
    let line = before.matches('\n').count() + 1;
    let col = before.rfind('\n').map_or(before.len(), |nl| before.len() - nl - 1) + 1;
    (line, col)
}
