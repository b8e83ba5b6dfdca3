// ==========================================
// 需求供应规划系统 - 国家解析
// ==========================================
// (原始国家名, 市场) → 国家代码
// 未命中: 记录 UNMAPPED_COUNTRY（同一组合只记一次），行被排除
// ==========================================

use crate::domain::batch::{DataGapKind, DataGapLog};
use crate::domain::lookup::{normalize_key, CountryMapping};
use std::collections::HashSet;

pub struct CountryResolver<'a> {
    mapping: &'a CountryMapping,
    reported: HashSet<(String, String)>,
}

impl<'a> CountryResolver<'a> {
    pub fn new(mapping: &'a CountryMapping) -> Self {
        Self {
            mapping,
            reported: HashSet::new(),
        }
    }

    pub fn resolve(
        &mut self,
        geography: &str,
        market: &str,
        gaps: &mut DataGapLog,
    ) -> Option<String> {
        if let Some(code) = self.mapping.resolve(geography, market) {
            return Some(code.to_string());
        }

        let key = (normalize_key(geography), normalize_key(market));
        if self.reported.insert(key.clone()) {
            gaps.record(
                DataGapKind::UnmappedCountry,
                format!("{}/{}", key.0, key.1),
                "国家映射未命中，相关需求行已排除",
            );
        }
        None
    }

    /// 未命中的不同组合数
    pub fn unmapped_count(&self) -> usize {
        self.reported.len()
    }
}
