//! Live snapshot as delivered by the dealer-site front end.
//!
//! Items arrive per category with the raw column headers of that category's
//! price table. [`SourceItem::to_record`] turns one item into the same field
//! layout the persisted catalog exports.

use serde::{Deserialize, Serialize};

use crate::model::{field, Record};

/// Dealer category number for "all categories".
pub const ALL_CATEGORIES: i32 = -1;
/// Category number the Judaica tab listing is delivered under.
pub const TABS_CATEGORY: i32 = -2;

/// Map a dealer category number to the catalog's internal category number.
///
/// Returns `None` when the dealer category has no catalog counterpart.
pub fn translate_category_number(number: i32) -> Option<i32> {
    match number {
        1..=4 | 7 => Some(number),
        5 => Some(6),
        8 => Some(5),
        6 | ALL_CATEGORIES => None,
        TABS_CATEGORY => Some(28),
        n => Some(n - 1),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceItem {
    pub code: String,
    pub description: String,
    pub status: String,
    pub picref: String,
    pub catalog1: String,
    pub catalog2: String,
    pub price1: String,
    pub price2: String,
    pub price3: String,
    pub price4: String,
    pub buy1: String,
    pub buy2: String,
    pub buy3: String,
    pub buy4: String,
    pub oldprice1: String,
    pub oldprice2: String,
    pub oldprice3: String,
    pub oldprice4: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCategory {
    pub number: i32,
    pub name: String,
    /// Column headers of the category's price table, e.g. `PriceFDC`.
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default)]
    pub items: Vec<SourceItem>,
}

impl SourceCategory {
    pub fn internal_number(&self) -> Option<i32> {
        translate_category_number(self.number)
    }

    /// True for the two-price layout whose second column is first-day covers.
    ///
    /// The scraper files that column under slot 3, so it has to move to slot 2.
    pub fn has_shifted_fdc_column(&self) -> bool {
        let has = |h: &str| self.headers.iter().any(|x| x == h);
        has("PriceFDC") && !has("PriceOther")
    }

    pub fn records(&self) -> Vec<Record> {
        self.items.iter().map(|item| item.to_record(self)).collect()
    }
}

fn buy_flag(value: &str) -> &'static str {
    if value.is_empty() {
        "0"
    } else {
        "1"
    }
}

impl SourceItem {
    pub fn to_record(&self, category: &SourceCategory) -> Record {
        let mut r = Record::new();
        r.insert(field::ID, self.code.as_str());
        r.insert(field::DESCRIPTION, self.description.as_str());
        r.insert(field::STATUS, self.status.as_str());
        r.insert(field::PICTYPE, "0");
        r.insert(field::PICTID, self.picref.as_str());
        r.insert(field::CAT1, self.catalog1.as_str());
        r.insert(field::CAT2, self.catalog2.as_str());
        r.insert(field::GROUP, category.name.as_str());
        let internal = category.internal_number().unwrap_or(ALL_CATEGORIES);
        r.insert(field::CATEGORY, internal.to_string());

        let prices = [&self.price1, &self.price2, &self.price3, &self.price4];
        let buys = [&self.buy1, &self.buy2, &self.buy3, &self.buy4];
        let old_prices = [&self.oldprice1, &self.oldprice2, &self.oldprice3, &self.oldprice4];

        let shifted = category.has_shifted_fdc_column();
        for slot in 0..4 {
            // slot 2 takes slot 3's values; slot 3 is left blank
            let (price, buy, old) = match (shifted, slot) {
                (true, 1) => (prices[2].as_str(), buy_flag(buys[2]), old_prices[2].as_str()),
                (true, 2) => ("", "0", ""),
                _ => (prices[slot].as_str(), buy_flag(buys[slot]), old_prices[slot].as_str()),
            };
            r.insert(field::PRICES[slot], price);
            r.insert(field::BUYS[slot], buy);
            r.insert(field::OLD_PRICES[slot], old);
        }
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> SourceItem {
        SourceItem {
            code: "6110".into(),
            description: "1950 Ancient Coins".into(),
            price1: "2.50".into(),
            price3: "4.00".into(),
            buy1: "x".into(),
            buy3: "x".into(),
            oldprice3: "3.75".into(),
            ..SourceItem::default()
        }
    }

    fn category(headers: &[&str]) -> SourceCategory {
        SourceCategory {
            number: 5,
            name: "Post Offices".into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            items: vec![item()],
        }
    }

    #[test]
    fn category_translation() {
        assert_eq!(translate_category_number(2), Some(2));
        assert_eq!(translate_category_number(4), Some(4));
        assert_eq!(translate_category_number(5), Some(6));
        assert_eq!(translate_category_number(6), None);
        assert_eq!(translate_category_number(7), Some(7));
        assert_eq!(translate_category_number(8), Some(5));
        assert_eq!(translate_category_number(12), Some(11));
        assert_eq!(translate_category_number(TABS_CATEGORY), Some(28));
        assert_eq!(translate_category_number(ALL_CATEGORIES), None);
    }

    #[test]
    fn plain_layout_keeps_slots() {
        let cat = category(&["Price", "PriceFDC", "PriceUsed", "PriceOther"]);
        let r = item().to_record(&cat);
        assert_eq!(r.value(field::ID), "6110");
        assert_eq!(r.value(field::DESCRIPTION), "1950 Ancient Coins");
        assert_eq!(r.value(field::PICTYPE), "0");
        assert_eq!(r.value(field::GROUP), "Post Offices");
        assert_eq!(r.value(field::CATEGORY), "6");
        assert_eq!(r.value("price2"), "");
        assert_eq!(r.value("price3"), "4.00");
        assert_eq!(r.value("buy1"), "1");
        assert_eq!(r.value("buy2"), "0");
        assert_eq!(r.value("buy3"), "1");
        assert_eq!(r.value("oldprice3"), "3.75");
    }

    #[test]
    fn fdc_column_moves_to_slot_two() {
        let cat = category(&["Price", "PriceFDC"]);
        assert!(cat.has_shifted_fdc_column());
        let r = item().to_record(&cat);
        assert_eq!(r.value("price2"), "4.00");
        assert_eq!(r.value("buy2"), "1");
        assert_eq!(r.value("oldprice2"), "3.75");
        assert_eq!(r.value("price3"), "");
        assert_eq!(r.value("buy3"), "0");
        assert_eq!(r.value("oldprice3"), "");
    }

    #[test]
    fn untranslatable_category_marks_record() {
        let mut cat = category(&[]);
        cat.number = 6;
        let records = cat.records();
        assert_eq!(records[0].value(field::CATEGORY), "-1");
    }
}
