//! 成本展開（原物料 → 產品 → 組合包）

use cogs_core::{Catalog, ComponentRef, CostingError, ItemKind};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// 記憶化快取鍵：（類型, 料號）
pub type MemoKey = (ItemKind, String);

/// 記憶化項目
#[derive(Debug, Clone, PartialEq)]
pub struct MemoEntry {
    pub resolved: ResolvedCost,
    /// 子樹高度：最深子件距此節點的層數
    pub height: usize,
}

/// 記憶化快取
pub type Memo = HashMap<MemoKey, MemoEntry>;

/// 成本解析狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CostStatus {
    /// 完整解析
    Resolved,
    /// 已解析，但有缺漏的子件以 0 計入
    Incomplete,
    /// 位於循環引用中（或依賴循環引用），成本不可信
    Cyclic,
    /// 巢狀層數超過上限
    DepthExceeded,
    /// 成本超出數值範圍
    Overflow,
    /// 料號不存在於目錄
    Missing,
}

impl CostStatus {
    /// 成本是否可作為定價依據
    pub fn is_authoritative(self) -> bool {
        matches!(self, CostStatus::Resolved | CostStatus::Incomplete)
    }

    /// 父件狀態 = 子件中最嚴重者
    fn absorb(self, child: CostStatus) -> CostStatus {
        let child = match child {
            CostStatus::Missing => CostStatus::Incomplete,
            other => other,
        };
        if child.rank() > self.rank() {
            child
        } else {
            self
        }
    }

    fn rank(self) -> u8 {
        match self {
            CostStatus::Resolved => 0,
            CostStatus::Incomplete | CostStatus::Missing => 1,
            CostStatus::Overflow => 2,
            CostStatus::DepthExceeded => 3,
            CostStatus::Cyclic => 4,
        }
    }
}

/// 單一料號的解析結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedCost {
    pub sku: String,
    pub kind: Option<ItemKind>,
    /// 單位成本（不可信狀態下為 0）
    pub cost: Decimal,
    pub status: CostStatus,
}

impl ResolvedCost {
    fn unresolved(sku: &str, kind: Option<ItemKind>, status: CostStatus) -> Self {
        Self {
            sku: sku.to_string(),
            kind,
            cost: Decimal::ZERO,
            status,
        }
    }
}

/// 成本解析過程發現的資料問題
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ResolutionIssue {
    MissingMaterial { product: String, material: String },
    UnknownComponent { package: String, component: String },
    UnknownSku(String),
    Cycle { path: Vec<String> },
    DepthExceeded { sku: String, depth: usize },
    Overflow { sku: String },
}

impl ResolutionIssue {
    /// 問題所屬料號
    pub fn sku(&self) -> &str {
        match self {
            ResolutionIssue::MissingMaterial { product, .. } => product,
            ResolutionIssue::UnknownComponent { package, .. } => package,
            ResolutionIssue::UnknownSku(sku) => sku,
            ResolutionIssue::Cycle { path } => path.first().map(String::as_str).unwrap_or(""),
            ResolutionIssue::DepthExceeded { sku, .. } => sku,
            ResolutionIssue::Overflow { sku } => sku,
        }
    }
}

impl fmt::Display for ResolutionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionIssue::MissingMaterial { product, material } => {
                write!(f, "產品 {} 的原物料 {} 不存在，以 0 計入", product, material)
            }
            ResolutionIssue::UnknownComponent { package, component } => {
                write!(f, "組合包 {} 的子件 {} 不存在，以 0 計入", package, component)
            }
            ResolutionIssue::UnknownSku(sku) => write!(f, "料號 {} 不存在於目錄", sku),
            ResolutionIssue::Cycle { path } => write!(f, "組合包循環引用: {}", path.join(" → ")),
            ResolutionIssue::DepthExceeded { sku, depth } => {
                write!(f, "料號 {} 的巢狀層數超過上限 {}", sku, depth)
            }
            ResolutionIssue::Overflow { sku } => write!(f, "料號 {} 的成本超出數值範圍", sku),
        }
    }
}

/// 成本明細行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostLine {
    pub component: String,
    pub kind: Option<ItemKind>,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub extended_cost: Decimal,
    pub status: CostStatus,
}

/// 全目錄成本表
#[derive(Debug, Clone, Default, Serialize)]
pub struct CostMap {
    pub costs: BTreeMap<String, ResolvedCost>,
    pub issues: Vec<ResolutionIssue>,
}

impl CostMap {
    /// 取得可信成本
    pub fn cost(&self, sku: &str) -> Option<Decimal> {
        self.costs
            .get(sku)
            .filter(|c| c.status.is_authoritative())
            .map(|c| c.cost)
    }

    /// 所有不可信的料號
    pub fn unresolved(&self) -> Vec<&ResolvedCost> {
        self.costs
            .values()
            .filter(|c| !c.status.is_authoritative())
            .collect()
    }
}

/// 成本解析器
///
/// 深度優先展開，以「處理中」集合偵測循環、以深度上限防止堆疊溢位。
/// 記憶化快取只屬於單一解析器實例；目錄以唯讀借用，解析期間不可被修改。
pub struct CostResolver<'a> {
    catalog: &'a Catalog,
    max_depth: usize,
    memo: Memo,
    stack: Vec<MemoKey>,
    in_progress: HashSet<MemoKey>,
    issues: Vec<ResolutionIssue>,
    seen_issues: HashSet<ResolutionIssue>,
}

impl<'a> CostResolver<'a> {
    /// 創建新的解析器
    pub fn new(catalog: &'a Catalog, max_depth: usize) -> Self {
        Self::with_memo(catalog, max_depth, Memo::new())
    }

    /// 以既有的記憶化結果創建解析器（供跨請求快取使用）
    pub fn with_memo(
        catalog: &'a Catalog,
        max_depth: usize,
        memo: Memo,
    ) -> Self {
        Self {
            catalog,
            max_depth,
            memo,
            stack: Vec::new(),
            in_progress: HashSet::new(),
            issues: Vec::new(),
            seen_issues: HashSet::new(),
        }
    }

    /// 解析料號單位成本
    ///
    /// `kind_hint` 指定時只在該類型的表中查找。
    pub fn resolve_cost(&mut self, sku: &str, kind_hint: Option<ItemKind>) -> ResolvedCost {
        let kind = match kind_hint {
            Some(kind) if self.exists_as(sku, kind) => Some(kind),
            Some(_) => None,
            None => self.catalog.kind_of(sku),
        };

        match kind {
            Some(kind) => self.resolve_node(kind, sku, 0).resolved,
            None => {
                self.record(ResolutionIssue::UnknownSku(sku.to_string()));
                ResolvedCost::unresolved(sku, kind_hint, CostStatus::Missing)
            }
        }
    }

    /// 解析成本，不可信時返回錯誤
    pub fn require_cost(&mut self, sku: &str) -> cogs_core::Result<Decimal> {
        let resolved = self.resolve_cost(sku, None);
        match resolved.status {
            CostStatus::Resolved | CostStatus::Incomplete => Ok(resolved.cost),
            CostStatus::Missing => Err(CostingError::SkuNotFound(sku.to_string())),
            CostStatus::Cyclic => Err(CostingError::UnresolvedCost {
                sku: sku.to_string(),
                reason: "組合包存在循環引用".to_string(),
            }),
            CostStatus::DepthExceeded => Err(CostingError::UnresolvedCost {
                sku: sku.to_string(),
                reason: format!("巢狀層數超過上限 {}", self.max_depth),
            }),
            CostStatus::Overflow => Err(CostingError::UnresolvedCost {
                sku: sku.to_string(),
                reason: "成本超出數值範圍".to_string(),
            }),
        }
    }

    /// 解析目錄中所有產品與組合包
    pub fn resolve_all(&mut self) -> CostMap {
        let mut costs = BTreeMap::new();
        for sku in self.catalog.sellable_skus() {
            let resolved = self.resolve_cost(&sku, None);
            costs.insert(sku, resolved);
        }
        tracing::debug!("全目錄成本解析完成: {} 筆, 問題 {} 筆", costs.len(), self.issues.len());

        CostMap {
            costs,
            issues: self.issues.clone(),
        }
    }

    /// 產品或組合包的成本明細
    pub fn explain(&mut self, sku: &str) -> cogs_core::Result<Vec<CostLine>> {
        let catalog = self.catalog;
        match catalog.kind_of(sku) {
            Some(ItemKind::Product) => {
                let recipe = catalog
                    .recipe(sku)
                    .ok_or_else(|| CostingError::SkuNotFound(sku.to_string()))?;
                Ok(recipe
                    .iter()
                    .map(|(material, &quantity)| match catalog.material(material) {
                        Some(m) => {
                            let extended = m.cost_for(quantity);
                            CostLine {
                                component: material.clone(),
                                kind: Some(ItemKind::Material),
                                quantity,
                                unit_cost: m.cost_per_unit,
                                extended_cost: extended.unwrap_or(Decimal::ZERO),
                                status: if extended.is_some() {
                                    CostStatus::Resolved
                                } else {
                                    CostStatus::Overflow
                                },
                            }
                        }
                        None => CostLine {
                            component: material.clone(),
                            kind: None,
                            quantity,
                            unit_cost: Decimal::ZERO,
                            extended_cost: Decimal::ZERO,
                            status: CostStatus::Missing,
                        },
                    })
                    .collect())
            }
            Some(ItemKind::Package) => {
                let package = catalog
                    .package(sku)
                    .ok_or_else(|| CostingError::SkuNotFound(sku.to_string()))?;
                let mut lines = Vec::with_capacity(package.components.len());
                for line in &package.components {
                    let resolved = match line.component.kind() {
                        Some(kind) => self.resolve_node(kind, line.component.sku(), 1).resolved,
                        None => ResolvedCost::unresolved(
                            line.component.sku(),
                            None,
                            CostStatus::Missing,
                        ),
                    };
                    let extended = resolved.cost.checked_mul(line.quantity);
                    lines.push(CostLine {
                        component: line.component.sku().to_string(),
                        kind: line.component.kind(),
                        quantity: line.quantity,
                        unit_cost: resolved.cost,
                        extended_cost: extended.unwrap_or(Decimal::ZERO),
                        status: match extended {
                            Some(_) => resolved.status,
                            None => CostStatus::Overflow,
                        },
                    });
                }
                Ok(lines)
            }
            Some(ItemKind::Material) => Err(CostingError::InvalidInput(format!(
                "{} 是原物料，沒有成本明細",
                sku
            ))),
            None => Err(CostingError::SkuNotFound(sku.to_string())),
        }
    }

    /// 解析過程中發現的問題（去重、依發現順序）
    pub fn issues(&self) -> &[ResolutionIssue] {
        &self.issues
    }

    /// 取出記憶化結果
    pub fn into_memo(self) -> Memo {
        self.memo
    }

    fn exists_as(&self, sku: &str, kind: ItemKind) -> bool {
        match kind {
            ItemKind::Material => self.catalog.material(sku).is_some(),
            ItemKind::Product => self.catalog.recipe(sku).is_some(),
            ItemKind::Package => self.catalog.package(sku).is_some(),
        }
    }

    fn resolve_node(&mut self, kind: ItemKind, sku: &str, depth: usize) -> MemoEntry {
        let key = (kind, sku.to_string());

        // 命中快取時以子樹高度重新檢查深度上限
        if let Some(hit) = self.memo.get(&key) {
            if depth + hit.height <= self.max_depth
                || hit.resolved.status.absorb(CostStatus::DepthExceeded) != CostStatus::DepthExceeded
            {
                return hit.clone();
            }
            let height = hit.height;
            return self.depth_exceeded(kind, sku, height);
        }

        if self.in_progress.contains(&key) {
            let start = self.stack.iter().position(|k| *k == key).unwrap_or(0);
            let mut path: Vec<String> = self.stack[start..].iter().map(|(_, s)| s.clone()).collect();
            path.push(sku.to_string());
            tracing::warn!("偵測到組合包循環引用: {}", path.join(" → "));
            self.record(ResolutionIssue::Cycle { path });
            return MemoEntry {
                resolved: ResolvedCost::unresolved(sku, Some(kind), CostStatus::Cyclic),
                height: 0,
            };
        }

        if depth > self.max_depth {
            return self.depth_exceeded(kind, sku, 0);
        }

        let entry = match kind {
            ItemKind::Material => self.resolve_material(sku),
            ItemKind::Product => self.resolve_product(sku),
            ItemKind::Package => {
                self.stack.push(key.clone());
                self.in_progress.insert(key.clone());
                let entry = self.resolve_package(sku, depth);
                self.in_progress.remove(&key);
                self.stack.pop();
                entry
            }
        };

        // 深度超限的結果取決於進入深度，不記憶化
        if entry.resolved.status != CostStatus::DepthExceeded {
            self.memo.insert(key, entry.clone());
        }

        tracing::debug!(
            "成本解析: {} ({}) = {} [{:?}]",
            sku,
            kind,
            entry.resolved.cost,
            entry.resolved.status
        );
        entry
    }

    fn depth_exceeded(&mut self, kind: ItemKind, sku: &str, height: usize) -> MemoEntry {
        tracing::warn!("料號 {} 巢狀層數超過上限 {}", sku, self.max_depth);
        self.record(ResolutionIssue::DepthExceeded {
            sku: sku.to_string(),
            depth: self.max_depth,
        });
        MemoEntry {
            resolved: ResolvedCost::unresolved(sku, Some(kind), CostStatus::DepthExceeded),
            height,
        }
    }

    fn overflowed(&mut self, kind: ItemKind, sku: &str) -> MemoEntry {
        tracing::warn!("料號 {} 的成本超出數值範圍", sku);
        self.record(ResolutionIssue::Overflow {
            sku: sku.to_string(),
        });
        MemoEntry {
            resolved: ResolvedCost::unresolved(sku, Some(kind), CostStatus::Overflow),
            height: 0,
        }
    }

    fn resolve_material(&mut self, sku: &str) -> MemoEntry {
        let resolved = match self.catalog.material(sku) {
            Some(material) => ResolvedCost {
                sku: sku.to_string(),
                kind: Some(ItemKind::Material),
                cost: material.cost_per_unit,
                status: CostStatus::Resolved,
            },
            None => ResolvedCost::unresolved(sku, Some(ItemKind::Material), CostStatus::Missing),
        };
        MemoEntry { resolved, height: 0 }
    }

    fn resolve_product(&mut self, sku: &str) -> MemoEntry {
        let catalog = self.catalog;
        let Some(recipe) = catalog.recipe(sku) else {
            return MemoEntry {
                resolved: ResolvedCost::unresolved(sku, Some(ItemKind::Product), CostStatus::Missing),
                height: 0,
            };
        };

        let mut total = Decimal::ZERO;
        let mut status = CostStatus::Resolved;

        for (material_sku, &quantity) in recipe {
            match catalog.material(material_sku) {
                Some(material) => {
                    match material.cost_for(quantity).and_then(|c| total.checked_add(c)) {
                        Some(sum) => total = sum,
                        None => return self.overflowed(ItemKind::Product, sku),
                    }
                }
                None => {
                    status = CostStatus::Incomplete;
                    self.record(ResolutionIssue::MissingMaterial {
                        product: sku.to_string(),
                        material: material_sku.clone(),
                    });
                }
            }
        }

        MemoEntry {
            resolved: ResolvedCost {
                sku: sku.to_string(),
                kind: Some(ItemKind::Product),
                cost: total,
                status,
            },
            height: 0,
        }
    }

    fn resolve_package(&mut self, sku: &str, depth: usize) -> MemoEntry {
        let catalog = self.catalog;
        let Some(package) = catalog.package(sku) else {
            return MemoEntry {
                resolved: ResolvedCost::unresolved(sku, Some(ItemKind::Package), CostStatus::Missing),
                height: 0,
            };
        };

        let mut total = Decimal::ZERO;
        let mut status = CostStatus::Resolved;
        let mut height = 0;
        let mut overflowed = false;

        for line in &package.components {
            let child = match &line.component {
                ComponentRef::Material(child) => self.resolve_node(ItemKind::Material, child, depth + 1),
                ComponentRef::Product(child) => self.resolve_node(ItemKind::Product, child, depth + 1),
                ComponentRef::Package(child) => self.resolve_node(ItemKind::Package, child, depth + 1),
                ComponentRef::Unknown(child) => {
                    self.record(ResolutionIssue::UnknownComponent {
                        package: sku.to_string(),
                        component: child.clone(),
                    });
                    status = status.absorb(CostStatus::Missing);
                    continue;
                }
            };

            height = height.max(child.height + 1);
            status = status.absorb(child.resolved.status);
            match child
                .resolved
                .cost
                .checked_mul(line.quantity)
                .and_then(|c| total.checked_add(c))
            {
                Some(sum) => total = sum,
                None => overflowed = true,
            }
        }

        if overflowed {
            status = status.absorb(CostStatus::Overflow);
            if status == CostStatus::Overflow {
                tracing::warn!("料號 {} 的成本超出數值範圍", sku);
                self.record(ResolutionIssue::Overflow {
                    sku: sku.to_string(),
                });
            }
        }
        if !status.is_authoritative() {
            total = Decimal::ZERO;
        }

        MemoEntry {
            resolved: ResolvedCost {
                sku: sku.to_string(),
                kind: Some(ItemKind::Package),
                cost: total,
                status,
            },
            height,
        }
    }

    fn record(&mut self, issue: ResolutionIssue) {
        if self.seen_issues.insert(issue.clone()) {
            self.issues.push(issue);
        }
    }
}
