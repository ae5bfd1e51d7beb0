//! 銷售通路設定存取（JSON 文件）

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::{CostingError, FeeModel, Result};

/// 通路設定集合：通路名稱 → 費用模型
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelStore {
    channels: BTreeMap<String, FeeModel>,
}

impl ChannelStore {
    /// 創建空集合
    pub fn new() -> Self {
        Self::default()
    }

    /// 從 JSON 字串載入
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut store: ChannelStore = serde_json::from_str(json)?;
        for (name, fees) in store.channels.iter_mut() {
            // 通路名稱以文件鍵為準
            fees.channel_name = name.clone();
            fees.validate()?;
        }
        Ok(store)
    }

    /// 輸出為 JSON 字串
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 從檔案載入；檔案不存在時返回空集合
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// 寫入檔案（自動建立上層目錄）
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    /// 取得通路費用模型
    pub fn get(&self, name: &str) -> Result<&FeeModel> {
        self.channels
            .get(name)
            .ok_or_else(|| CostingError::ChannelNotFound(name.to_string()))
    }

    /// 新增或更新通路
    pub fn upsert(&mut self, name: impl Into<String>, fees: FeeModel) -> Result<()> {
        let name = name.into();
        fees.validate()?;
        let fees = fees.with_channel_name(name.clone());
        self.channels.insert(name, fees);
        Ok(())
    }

    /// 刪除通路
    pub fn remove(&mut self, name: &str) -> Option<FeeModel> {
        self.channels.remove(name)
    }

    /// 所有通路名稱（已排序）
    pub fn names(&self) -> Vec<&str> {
        self.channels.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
