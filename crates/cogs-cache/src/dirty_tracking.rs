//! 髒標記追蹤

use cogs_core::Catalog;
use std::collections::HashSet;

/// 髒標記追蹤器（成本已過期的料號）
pub struct DirtyTracker {
    dirty_skus: HashSet<String>,
}

impl DirtyTracker {
    /// 創建新的追蹤器
    pub fn new() -> Self {
        Self {
            dirty_skus: HashSet::new(),
        }
    }

    /// 標記料號為髒
    pub fn mark_dirty(&mut self, sku: impl Into<String>) {
        self.dirty_skus.insert(sku.into());
    }

    /// 標記料號以及所有直接或間接引用它的產品與組合包
    pub fn mark_with_dependents(&mut self, catalog: &Catalog, sku: &str) {
        let mut pending = vec![sku.to_string()];
        while let Some(current) = pending.pop() {
            if !self.dirty_skus.insert(current.clone()) {
                continue;
            }
            pending.extend(
                catalog
                    .dependents_of(&current)
                    .into_iter()
                    .filter(|parent| !self.dirty_skus.contains(parent)),
            );
        }
    }

    /// 檢查料號是否為髒
    pub fn is_dirty(&self, sku: &str) -> bool {
        self.dirty_skus.contains(sku)
    }

    /// 清除所有髒標記
    pub fn clear(&mut self) {
        self.dirty_skus.clear();
    }

    /// 獲取所有髒料號（已排序）
    pub fn dirty_skus(&self) -> Vec<String> {
        let mut skus: Vec<String> = self.dirty_skus.iter().cloned().collect();
        skus.sort();
        skus
    }

    pub fn len(&self) -> usize {
        self.dirty_skus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirty_skus.is_empty()
    }
}

impl Default for DirtyTracker {
    fn default() -> Self {
        Self::new()
    }
}
