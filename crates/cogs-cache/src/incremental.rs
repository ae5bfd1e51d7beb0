//! 增量成本快取
//!
//! 快取綁定目錄版本。呼叫端修改目錄後以 `notify_changed` 告知異動料號，
//! 只有異動料號與其上層產品、組合包會被淘汰；未經告知的版本變更會清空整個快取。

use cogs_calc::{CostMap, CostResolver, Memo, ResolutionIssue, ResolvedCost};
use cogs_core::Catalog;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::dirty_tracking::DirtyTracker;

/// 快取統計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// 因異動被淘汰的項目數
    pub evictions: u64,
    /// 因版本不符而整個清空的次數
    pub full_invalidations: u64,
}

/// 增量成本快取
pub struct IncrementalCostCache {
    version: Option<u64>,
    max_depth: usize,
    memo: Memo,
    issues: Vec<ResolutionIssue>,
    tracker: DirtyTracker,
    stats: CacheStats,
}

impl IncrementalCostCache {
    /// 創建空快取
    pub fn new(max_depth: usize) -> Self {
        Self {
            version: None,
            max_depth,
            memo: Memo::new(),
            issues: Vec::new(),
            tracker: DirtyTracker::new(),
            stats: CacheStats::default(),
        }
    }

    /// 目錄已修改：淘汰異動料號與其上層，並採用新版本
    pub fn notify_changed<S: AsRef<str>>(&mut self, catalog: &Catalog, skus: &[S]) {
        for sku in skus {
            self.tracker.mark_with_dependents(catalog, sku.as_ref());
        }

        let before = self.memo.len();
        let tracker = &self.tracker;
        self.memo.retain(|(_, sku), _| !tracker.is_dirty(sku));
        self.issues.retain(|issue| !tracker.is_dirty(issue.sku()));
        let evicted = (before - self.memo.len()) as u64;

        tracing::debug!(
            "目錄版本 {} 異動 {} 筆料號，淘汰快取 {} 筆",
            catalog.version(),
            self.tracker.len(),
            evicted
        );

        self.stats.evictions += evicted;
        self.tracker.clear();
        self.version = Some(catalog.version());
    }

    /// 解析料號成本（命中快取時不重新展開）
    pub fn resolve(&mut self, catalog: &Catalog, sku: &str) -> ResolvedCost {
        self.sync(catalog);

        if let Some(kind) = catalog.kind_of(sku) {
            if let Some(hit) = self.memo.get(&(kind, sku.to_string())) {
                self.stats.hits += 1;
                return hit.resolved.clone();
            }
        }

        self.stats.misses += 1;
        let mut resolver = CostResolver::with_memo(catalog, self.max_depth, std::mem::take(&mut self.memo));
        let resolved = resolver.resolve_cost(sku, None);
        self.absorb(resolver);
        resolved
    }

    /// 解析目錄中所有產品與組合包
    pub fn resolve_all(&mut self, catalog: &Catalog) -> CostMap {
        let costs: BTreeMap<String, ResolvedCost> = catalog
            .sellable_skus()
            .into_iter()
            .map(|sku| {
                let resolved = self.resolve(catalog, &sku);
                (sku, resolved)
            })
            .collect();

        CostMap {
            costs,
            issues: self.issues.clone(),
        }
    }

    /// 清空快取
    pub fn invalidate_all(&mut self) {
        self.memo.clear();
        self.issues.clear();
        self.version = None;
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// 快取對應的目錄版本
    pub fn version(&self) -> Option<u64> {
        self.version
    }

    pub fn len(&self) -> usize {
        self.memo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memo.is_empty()
    }

    /// 版本不符且未經告知：整個清空
    fn sync(&mut self, catalog: &Catalog) {
        if self.version == Some(catalog.version()) {
            return;
        }
        if self.version.is_some() {
            tracing::warn!(
                "目錄版本由 {:?} 變為 {}，未收到異動通知，清空成本快取",
                self.version,
                catalog.version()
            );
            self.stats.full_invalidations += 1;
        }
        self.memo.clear();
        self.issues.clear();
        self.version = Some(catalog.version());
    }

    fn absorb(&mut self, resolver: CostResolver<'_>) {
        for issue in resolver.issues() {
            if !self.issues.contains(issue) {
                self.issues.push(issue.clone());
            }
        }
        self.memo = resolver.into_memo();
    }
}
