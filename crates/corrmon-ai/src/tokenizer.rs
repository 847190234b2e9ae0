use anyhow::{Context, Result};
use tiktoken_rs::{get_bpe_from_model, CoreBPE};

/// Token 计数器 trait（选择算法只依赖计数，不依赖具体编码实现）
pub trait Tokenizer: Send + Sync {
    /// 文本的 token 数
    fn count_tokens(&self, text: &str) -> usize;
}

/// 基于 tiktoken BPE 编码的计数器
pub struct TiktokenTokenizer {
    bpe: CoreBPE,
    model: String,
}

impl TiktokenTokenizer {
    /// 按模型名加载编码表；未知模型直接报错（启动期失败好过静默错算）
    pub fn for_model(model: &str) -> Result<Self> {
        let bpe = get_bpe_from_model(model)
            .with_context(|| format!("No tiktoken encoding for model {model}"))?;
        Ok(Self {
            bpe,
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}
