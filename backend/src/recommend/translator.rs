use std::collections::HashSet;

/// English category -> Vietnamese search term.
const CATEGORY_TRANSLATIONS: &[(&str, &str)] = &[
    ("Laptop", "Máy tính xách tay"),
    ("Cell Phone", "Điện thoại di động"),
    ("Mobile Phone", "Điện thoại di động"),
    ("Smartphone", "Điện thoại thông minh"),
    ("Television", "Tivi"),
    ("TV", "Tivi"),
    ("Camera", "Máy ảnh"),
    ("Headphone", "Tai nghe"),
    ("Headphones", "Tai nghe"),
    ("Watch", "Đồng hồ"),
    ("Smart Watch", "Đồng hồ thông minh"),
    ("Shoe", "Giày"),
    ("Shoes", "Giày"),
    ("Dress", "Váy"),
    ("T-shirt", "Áo thun"),
    ("Shirt", "Áo sơ mi"),
    ("Bag", "Túi xách"),
    ("Backpack", "Balo"),
    ("Furniture", "Đồ nội thất"),
    ("Sofa", "Ghế sofa"),
    ("Table", "Bàn"),
    ("Chair", "Ghế"),
    ("Book", "Sách"),
    ("Food", "Thực phẩm"),
    ("Bicycle", "Xe đạp"),
    ("Toy", "Đồ chơi"),
    ("Makeup", "Mỹ phẩm"),
    ("Cosmetics", "Mỹ phẩm"),
    ("Jewelry", "Trang sức"),
    ("Ring", "Nhẫn"),
    ("Necklace", "Vòng cổ"),
    ("Bracelet", "Vòng tay"),
    ("Computer", "Máy tính"),
    ("Keyboard", "Bàn phím"),
    ("Mouse", "Chuột máy tính"),
    ("Monitor", "Màn hình"),
    ("Printer", "Máy in"),
    ("Refrigerator", "Tủ lạnh"),
    ("Washing Machine", "Máy giặt"),
    ("Air Conditioner", "Máy điều hòa"),
    ("Fan", "Quạt"),
    ("Microwave", "Lò vi sóng"),
    ("Oven", "Lò nướng"),
    ("Blender", "Máy xay"),
    ("Rice Cooker", "Nồi cơm điện"),
    ("Guitar", "Đàn guitar"),
    ("Piano", "Đàn piano"),
    ("Violin", "Đàn violin"),
    ("Drum", "Trống"),
    ("Perfume", "Nước hoa"),
    ("Sunglasses", "Kính mát"),
    ("Glasses", "Kính"),
    ("Hat", "Mũ"),
    ("Cap", "Mũ lưỡi trai"),
    ("Belt", "Thắt lưng"),
    ("Wallet", "Ví"),
    ("Umbrella", "Ô dù"),
    ("Clock", "Đồng hồ treo tường"),
    ("Lamp", "Đèn"),
    ("Carpet", "Thảm"),
    ("Curtain", "Rèm"),
    ("Pillow", "Gối"),
    ("Blanket", "Chăn"),
    ("Towel", "Khăn tắm"),
    ("Bottle", "Chai"),
    ("Cup", "Cốc"),
    ("Plate", "Đĩa"),
    ("Bowl", "Bát"),
    ("Spoon", "Thìa"),
    ("Fork", "Nĩa"),
    ("Knife", "Dao"),
    ("Pot", "Nồi"),
    ("Pan", "Chảo"),
];

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || matches!(c, '_' | '-' | ',' | '/'))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Word offset of the first occurrence of `needle` inside `haystack`.
fn find_words(haystack: &[String], needle: &[String]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Turns classifier labels into search queries.
#[derive(Debug, Clone, Default)]
pub struct LabelTranslator {
    localized: bool,
    generic_keywords: Vec<String>,
}

impl LabelTranslator {
    pub fn new(localized: bool, generic_keywords: Vec<String>) -> Self {
        Self {
            localized,
            generic_keywords,
        }
    }

    /// Vietnamese term for `class_name`. The key that occurs earliest in the
    /// label wins; among keys at the same offset the longest one does.
    pub fn localize(class_name: &str) -> Option<&'static str> {
        let label = words(class_name);
        CATEGORY_TRANSLATIONS
            .iter()
            .filter_map(|(key, vi)| {
                let key_words = words(key);
                find_words(&label, &key_words).map(|pos| (pos, key_words.len(), *vi))
            })
            .min_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)))
            .map(|(_, _, vi)| vi)
    }

    pub fn translate(&self, class_names: &[String]) -> Vec<String> {
        let mut queries: Vec<String> = class_names
            .iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();

        if self.localized {
            for name in class_names {
                if let Some(vi) = Self::localize(name) {
                    queries.push(vi.to_string());
                }
            }
        }

        for name in class_names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
            for keyword in &self.generic_keywords {
                queries.push(format!("{} {}", name, keyword));
            }
        }

        let mut seen = HashSet::new();
        queries.retain(|q| seen.insert(q.to_lowercase()));
        queries
    }
}
