//! 產品目錄：原物料、產品配方、組合包

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use crate::{CostingError, Material, Result};

/// 產品配方：原物料料號 → 用量
pub type Recipe = BTreeMap<String, Decimal>;

/// 組合包原始組成：子件料號 → 數量
pub type Composition = BTreeMap<String, Decimal>;

/// 品項類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemKind {
    /// 原物料
    Material,
    /// 產品（依配方組成）
    Product,
    /// 組合包（可巢狀）
    Package,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Material => write!(f, "material"),
            ItemKind::Product => write!(f, "product"),
            ItemKind::Package => write!(f, "package"),
        }
    }
}

/// 組合包子件引用（載入時即解析類型）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentRef {
    Material(String),
    Product(String),
    Package(String),
    /// 三個表中都找不到的料號
    Unknown(String),
}

impl ComponentRef {
    /// 子件料號
    pub fn sku(&self) -> &str {
        match self {
            ComponentRef::Material(sku)
            | ComponentRef::Product(sku)
            | ComponentRef::Package(sku)
            | ComponentRef::Unknown(sku) => sku,
        }
    }

    /// 子件類型（未知料號為 None）
    pub fn kind(&self) -> Option<ItemKind> {
        match self {
            ComponentRef::Material(_) => Some(ItemKind::Material),
            ComponentRef::Product(_) => Some(ItemKind::Product),
            ComponentRef::Package(_) => Some(ItemKind::Package),
            ComponentRef::Unknown(_) => None,
        }
    }
}

/// 組合包子件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageComponent {
    pub component: ComponentRef,
    pub quantity: Decimal,
}

/// 組合包
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub sku: String,
    pub components: Vec<PackageComponent>,
}

/// 目錄資料完整性問題（非致命）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatalogIssue {
    /// 產品配方引用了不存在的原物料
    MissingMaterial { product: String, material: String },
    /// 組合包引用了不存在的子件
    UnknownComponent { package: String, component: String },
    /// 同一料號出現在多個表中
    SkuCollision { sku: String, kinds: Vec<ItemKind> },
    /// 產品配方為空
    EmptyRecipe(String),
    /// 組合包沒有任何子件
    EmptyPackage(String),
}

impl fmt::Display for CatalogIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogIssue::MissingMaterial { product, material } => {
                write!(f, "產品 {} 的配方引用了不存在的原物料 {}", product, material)
            }
            CatalogIssue::UnknownComponent { package, component } => {
                write!(f, "組合包 {} 含有不存在的子件 {}", package, component)
            }
            CatalogIssue::SkuCollision { sku, kinds } => {
                let kinds: Vec<String> = kinds.iter().map(|k| k.to_string()).collect();
                write!(f, "料號 {} 同時存在於多個表: {}", sku, kinds.join(", "))
            }
            CatalogIssue::EmptyRecipe(sku) => write!(f, "產品 {} 的配方為空", sku),
            CatalogIssue::EmptyPackage(sku) => write!(f, "組合包 {} 沒有子件", sku),
        }
    }
}

/// 產品目錄
///
/// 子件類型在載入時依固定順序（原物料 → 產品 → 組合包）解析一次，
/// 每次修改都會遞增 `version` 並重新連結子件。
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    materials: HashMap<String, Material>,
    recipes: HashMap<String, Recipe>,
    packages: HashMap<String, Package>,
    version: u64,
}

impl Catalog {
    /// 創建空目錄
    pub fn new() -> Self {
        Self::default()
    }

    /// 由載入器提供的三張表建立目錄
    ///
    /// 重複的原物料料號以最後一筆為準。
    pub fn from_parts(
        materials: impl IntoIterator<Item = Material>,
        recipes: BTreeMap<String, Recipe>,
        compositions: BTreeMap<String, Composition>,
    ) -> Result<Self> {
        let mut catalog = Self::new();

        for material in materials {
            validate_material(&material)?;
            catalog.materials.insert(material.sku.clone(), material);
        }

        for (sku, recipe) in recipes {
            validate_lines(&sku, &recipe)?;
            catalog.recipes.insert(sku, recipe);
        }

        for (sku, composition) in compositions {
            validate_lines(&sku, &composition)?;
            let components = composition
                .into_iter()
                .map(|(component_sku, quantity)| PackageComponent {
                    component: ComponentRef::Unknown(component_sku),
                    quantity,
                })
                .collect();
            catalog.packages.insert(sku.clone(), Package { sku, components });
        }

        catalog.link_components();
        catalog.version = 1;
        Ok(catalog)
    }

    /// 建構器模式：加入原物料
    pub fn with_material(mut self, material: Material) -> Result<Self> {
        self.upsert_material(material)?;
        Ok(self)
    }

    /// 建構器模式：加入產品配方
    pub fn with_recipe<I, S>(mut self, sku: impl Into<String>, lines: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: Into<String>,
    {
        let recipe = lines.into_iter().map(|(m, q)| (m.into(), q)).collect();
        self.upsert_recipe(sku, recipe)?;
        Ok(self)
    }

    /// 建構器模式：加入組合包
    pub fn with_package<I, S>(mut self, sku: impl Into<String>, lines: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: Into<String>,
    {
        let composition = lines.into_iter().map(|(c, q)| (c.into(), q)).collect();
        self.upsert_package(sku, composition)?;
        Ok(self)
    }

    /// 新增或更新原物料
    pub fn upsert_material(&mut self, material: Material) -> Result<()> {
        validate_material(&material)?;
        self.materials.insert(material.sku.clone(), material);
        self.touch();
        Ok(())
    }

    /// 新增或更新產品配方
    pub fn upsert_recipe(&mut self, sku: impl Into<String>, recipe: Recipe) -> Result<()> {
        let sku = sku.into();
        validate_lines(&sku, &recipe)?;
        self.recipes.insert(sku, recipe);
        self.touch();
        Ok(())
    }

    /// 新增或更新組合包
    pub fn upsert_package(&mut self, sku: impl Into<String>, composition: Composition) -> Result<()> {
        let sku = sku.into();
        validate_lines(&sku, &composition)?;
        let components = composition
            .into_iter()
            .map(|(component_sku, quantity)| PackageComponent {
                component: ComponentRef::Unknown(component_sku),
                quantity,
            })
            .collect();
        self.packages.insert(sku.clone(), Package { sku, components });
        self.touch();
        Ok(())
    }

    /// 刪除料號（依原物料 → 產品 → 組合包順序），返回被刪除的類型
    pub fn remove(&mut self, sku: &str) -> Option<ItemKind> {
        let removed = if self.materials.remove(sku).is_some() {
            Some(ItemKind::Material)
        } else if self.recipes.remove(sku).is_some() {
            Some(ItemKind::Product)
        } else if self.packages.remove(sku).is_some() {
            Some(ItemKind::Package)
        } else {
            None
        };

        if removed.is_some() {
            self.touch();
        }
        removed
    }

    /// 目錄版本（每次修改遞增）
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn material(&self, sku: &str) -> Option<&Material> {
        self.materials.get(sku)
    }

    pub fn recipe(&self, sku: &str) -> Option<&Recipe> {
        self.recipes.get(sku)
    }

    pub fn package(&self, sku: &str) -> Option<&Package> {
        self.packages.get(sku)
    }

    pub fn materials(&self) -> impl Iterator<Item = &Material> {
        self.materials.values()
    }

    /// 判斷料號類型（固定順序：原物料 → 產品 → 組合包）
    pub fn kind_of(&self, sku: &str) -> Option<ItemKind> {
        classify(sku, &self.materials, &self.recipes, |s| self.packages.contains_key(s)).kind()
    }

    pub fn contains(&self, sku: &str) -> bool {
        self.kind_of(sku).is_some()
    }

    /// 物料、產品、組合包總數
    pub fn len(&self) -> usize {
        self.materials.len() + self.recipes.len() + self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 可銷售料號：先產品、後組合包，各自排序
    pub fn sellable_skus(&self) -> Vec<String> {
        let mut products: Vec<String> = self.recipes.keys().cloned().collect();
        products.sort();
        let mut packages: Vec<String> = self.packages.keys().cloned().collect();
        packages.sort();
        products.extend(packages);
        products
    }

    /// 直接引用該料號的父件（產品或組合包），已排序
    pub fn dependents_of(&self, sku: &str) -> Vec<String> {
        let mut dependents: Vec<String> = self
            .recipes
            .iter()
            .filter(|(_, recipe)| recipe.contains_key(sku))
            .map(|(product, _)| product.clone())
            .chain(
                self.packages
                    .values()
                    .filter(|pkg| pkg.components.iter().any(|c| c.component.sku() == sku))
                    .map(|pkg| pkg.sku.clone()),
            )
            .collect();
        dependents.sort();
        dependents.dedup();
        dependents
    }

    /// 資料完整性檢查
    pub fn integrity_report(&self) -> Vec<CatalogIssue> {
        let mut issues = Vec::new();

        let mut products: Vec<&String> = self.recipes.keys().collect();
        products.sort();
        for product in products {
            let recipe = &self.recipes[product];
            if recipe.is_empty() {
                issues.push(CatalogIssue::EmptyRecipe(product.clone()));
            }
            for material in recipe.keys() {
                if !self.materials.contains_key(material) {
                    issues.push(CatalogIssue::MissingMaterial {
                        product: product.clone(),
                        material: material.clone(),
                    });
                }
            }
        }

        let mut packages: Vec<&Package> = self.packages.values().collect();
        packages.sort_by(|a, b| a.sku.cmp(&b.sku));
        for package in packages {
            if package.components.is_empty() {
                issues.push(CatalogIssue::EmptyPackage(package.sku.clone()));
            }
            for line in &package.components {
                if let ComponentRef::Unknown(component) = &line.component {
                    issues.push(CatalogIssue::UnknownComponent {
                        package: package.sku.clone(),
                        component: component.clone(),
                    });
                }
            }
        }

        // 料號衝突：同一料號同時存在於多個表
        let mut all_skus: Vec<&String> = self
            .materials
            .keys()
            .chain(self.recipes.keys())
            .chain(self.packages.keys())
            .collect();
        all_skus.sort();
        all_skus.dedup();
        for sku in all_skus {
            let mut kinds = Vec::new();
            if self.materials.contains_key(sku) {
                kinds.push(ItemKind::Material);
            }
            if self.recipes.contains_key(sku) {
                kinds.push(ItemKind::Product);
            }
            if self.packages.contains_key(sku) {
                kinds.push(ItemKind::Package);
            }
            if kinds.len() > 1 {
                issues.push(CatalogIssue::SkuCollision {
                    sku: sku.clone(),
                    kinds,
                });
            }
        }

        issues
    }

    /// 修改後遞增版本並重新連結子件
    fn touch(&mut self) {
        self.version += 1;
        self.link_components();
    }

    /// 依目前三張表重新解析所有組合包子件的類型
    fn link_components(&mut self) {
        let package_keys: HashSet<String> = self.packages.keys().cloned().collect();
        let materials = &self.materials;
        let recipes = &self.recipes;

        for package in self.packages.values_mut() {
            for line in &mut package.components {
                let sku = line.component.sku().to_string();
                line.component = classify(&sku, materials, recipes, |s| package_keys.contains(s));
            }
        }
    }
}

fn classify(
    sku: &str,
    materials: &HashMap<String, Material>,
    recipes: &HashMap<String, Recipe>,
    is_package: impl Fn(&str) -> bool,
) -> ComponentRef {
    if materials.contains_key(sku) {
        ComponentRef::Material(sku.to_string())
    } else if recipes.contains_key(sku) {
        ComponentRef::Product(sku.to_string())
    } else if is_package(sku) {
        ComponentRef::Package(sku.to_string())
    } else {
        ComponentRef::Unknown(sku.to_string())
    }
}

fn validate_material(material: &Material) -> Result<()> {
    if material.sku.trim().is_empty() {
        return Err(CostingError::InvalidCatalog("原物料料號不可為空".to_string()));
    }
    if material.cost_per_unit < Decimal::ZERO {
        return Err(CostingError::InvalidCatalog(format!(
            "原物料 {} 的單位成本不可為負: {}",
            material.sku, material.cost_per_unit
        )));
    }
    Ok(())
}

fn validate_lines(sku: &str, lines: &BTreeMap<String, Decimal>) -> Result<()> {
    if sku.trim().is_empty() {
        return Err(CostingError::InvalidCatalog("料號不可為空".to_string()));
    }
    for (component, quantity) in lines {
        if component.trim().is_empty() {
            return Err(CostingError::InvalidCatalog(format!("{} 含有空白子件料號", sku)));
        }
        if *quantity < Decimal::ZERO {
            return Err(CostingError::InvalidCatalog(format!(
                "{} 的子件 {} 用量不可為負: {}",
                sku, component, quantity
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_catalog() -> Catalog {
        Catalog::new()
            .with_material(Material::new("MAT-A", Decimal::from(2)))
            .unwrap()
            .with_recipe("PRD-1", [("MAT-A", Decimal::from(3))])
            .unwrap()
            .with_package("PKG-1", [("PRD-1", Decimal::from(2)), ("MAT-A", Decimal::ONE)])
            .unwrap()
    }

    #[test]
    fn test_components_are_classified_at_load() {
        let catalog = sample_catalog();
        let package = catalog.package("PKG-1").unwrap();

        let kinds: Vec<_> = package.components.iter().map(|c| c.component.clone()).collect();
        assert!(kinds.contains(&ComponentRef::Product("PRD-1".to_string())));
        assert!(kinds.contains(&ComponentRef::Material("MAT-A".to_string())));
    }

    #[test]
    fn test_relink_after_late_definition() {
        let mut catalog = Catalog::new()
            .with_package("PKG-1", [("PRD-9", Decimal::ONE)])
            .unwrap();
        assert_eq!(
            catalog.package("PKG-1").unwrap().components[0].component,
            ComponentRef::Unknown("PRD-9".to_string())
        );

        let mut recipe = Recipe::new();
        recipe.insert("MAT-A".to_string(), Decimal::ONE);
        catalog.upsert_recipe("PRD-9", recipe).unwrap();

        assert_eq!(
            catalog.package("PKG-1").unwrap().components[0].component,
            ComponentRef::Product("PRD-9".to_string())
        );
    }

    #[test]
    fn test_version_bumps_on_mutation() {
        let mut catalog = sample_catalog();
        let before = catalog.version();

        catalog
            .upsert_material(Material::new("MAT-A", Decimal::from(5)))
            .unwrap();
        assert_eq!(catalog.version(), before + 1);

        assert_eq!(catalog.remove("NOPE"), None);
        assert_eq!(catalog.version(), before + 1);

        assert_eq!(catalog.remove("PKG-1"), Some(ItemKind::Package));
        assert_eq!(catalog.version(), before + 2);
    }

    #[test]
    fn test_rejects_negative_values() {
        let negative_cost = Catalog::new().with_material(Material::new("MAT-X", Decimal::from(-1)));
        assert!(matches!(negative_cost, Err(CostingError::InvalidCatalog(_))));

        let negative_qty = Catalog::new().with_recipe("PRD-X", [("MAT-A", Decimal::from(-2))]);
        assert!(matches!(negative_qty, Err(CostingError::InvalidCatalog(_))));
    }

    #[test]
    fn test_integrity_report() {
        let catalog = Catalog::new()
            .with_material(Material::new("DUP", Decimal::ONE))
            .unwrap()
            .with_recipe("DUP", [("MAT-MISSING", Decimal::ONE)])
            .unwrap()
            .with_recipe("PRD-EMPTY", Vec::<(String, Decimal)>::new())
            .unwrap()
            .with_package("PKG-1", [("GHOST", Decimal::ONE)])
            .unwrap();

        let issues = catalog.integrity_report();

        assert!(issues.contains(&CatalogIssue::MissingMaterial {
            product: "DUP".to_string(),
            material: "MAT-MISSING".to_string(),
        }));
        assert!(issues.contains(&CatalogIssue::EmptyRecipe("PRD-EMPTY".to_string())));
        assert!(issues.contains(&CatalogIssue::UnknownComponent {
            package: "PKG-1".to_string(),
            component: "GHOST".to_string(),
        }));
        assert!(issues.contains(&CatalogIssue::SkuCollision {
            sku: "DUP".to_string(),
            kinds: vec![ItemKind::Material, ItemKind::Product],
        }));
    }

    #[test]
    fn test_dependents_and_sellable() {
        let catalog = sample_catalog();

        assert_eq!(catalog.dependents_of("MAT-A"), vec!["PKG-1", "PRD-1"]);
        assert_eq!(catalog.dependents_of("PRD-1"), vec!["PKG-1"]);
        assert_eq!(catalog.sellable_skus(), vec!["PRD-1", "PKG-1"]);
        assert_eq!(catalog.kind_of("PKG-1"), Some(ItemKind::Package));
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn test_from_parts() {
        let mut recipes = BTreeMap::new();
        recipes.insert("PRD-1".to_string(), Recipe::from([("MAT-A".to_string(), Decimal::ONE)]));
        let mut compositions = BTreeMap::new();
        compositions.insert(
            "PKG-1".to_string(),
            Composition::from([("PRD-1".to_string(), Decimal::from(2))]),
        );

        let catalog = Catalog::from_parts(
            vec![Material::new("MAT-A", Decimal::from(3))],
            recipes,
            compositions,
        )
        .unwrap();

        assert_eq!(catalog.version(), 1);
        assert_eq!(
            catalog.package("PKG-1").unwrap().components[0].component,
            ComponentRef::Product("PRD-1".to_string())
        );
    }
}
