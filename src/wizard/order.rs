use std::fmt;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("size {size} is not offered for {kind}")]
    UnknownSize { kind: OrderKind, size: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    Print,
    IdPhoto,
}

impl OrderKind {
    pub const ALL: [OrderKind; 2] = [OrderKind::Print, OrderKind::IdPhoto];

    pub fn code(self) -> &'static str {
        match self {
            OrderKind::Print => "print",
            OrderKind::IdPhoto => "id_photo",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        OrderKind::ALL.into_iter().find(|kind| kind.code() == code)
    }

    pub fn label(self) -> &'static str {
        match self {
            OrderKind::Print => "Photo print",
            OrderKind::IdPhoto => "ID photo pack",
        }
    }

    pub fn catalog(self) -> &'static [SizeOption] {
        match self {
            OrderKind::Print => &PRINT_OPTIONS,
            OrderKind::IdPhoto => &ID_PHOTO_OPTIONS,
        }
    }

    pub fn default_size(self) -> &'static SizeOption {
        match self {
            OrderKind::Print => &PRINT_OPTIONS[2],
            OrderKind::IdPhoto => &ID_PHOTO_OPTIONS[1],
        }
    }

    pub fn find_size(self, id: &str) -> Option<&'static SizeOption> {
        self.catalog().iter().find(|option| option.id == id)
    }

    fn quantity_unit(self) -> &'static str {
        match self {
            OrderKind::Print => "sheet",
            OrderKind::IdPhoto => "pack",
        }
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct SizeOption {
    pub id: &'static str,
    pub label: &'static str,
    pub price: u64,
    pub description: &'static str,
}

const PRINT_OPTIONS: [SizeOption; 6] = [
    SizeOption { id: "2R", label: "2R (6x9 cm)", price: 2500, description: "Wallet size" },
    SizeOption { id: "3R", label: "3R (8.9x12.7 cm)", price: 3000, description: "Standard size" },
    SizeOption { id: "4R", label: "4R (10.2x15.2 cm)", price: 3500, description: "Postcard size" },
    SizeOption { id: "5R", label: "5R (12.7x17.8 cm)", price: 5000, description: "Medium size" },
    SizeOption { id: "8R", label: "8R (20.3x25.4 cm)", price: 15000, description: "Large size" },
    SizeOption { id: "10R", label: "10R (25.4x30.5 cm)", price: 25000, description: "Frame size" },
];

const ID_PHOTO_OPTIONS: [SizeOption; 3] = [
    SizeOption { id: "4x6", label: "4x6 cm", price: 10000, description: "Pack of 4 photos" },
    SizeOption { id: "3x4", label: "3x4 cm", price: 10000, description: "Pack of 6 photos" },
    SizeOption { id: "2x3", label: "2x3 cm", price: 10000, description: "Pack of 9 photos" },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Finish {
    #[default]
    Matte,
    Glossy,
}

impl Finish {
    pub const ALL: [Finish; 2] = [Finish::Matte, Finish::Glossy];

    pub fn code(self) -> &'static str {
        match self {
            Finish::Matte => "matte",
            Finish::Glossy => "glossy",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Finish::ALL.into_iter().find(|finish| finish.code() == code)
    }

    pub fn label(self) -> &'static str {
        match self {
            Finish::Matte => "Matte",
            Finish::Glossy => "Glossy",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundColor {
    Red,
    Blue,
    White,
}

impl BackgroundColor {
    pub const ALL: [BackgroundColor; 3] =
        [BackgroundColor::Red, BackgroundColor::Blue, BackgroundColor::White];

    pub fn code(self) -> &'static str {
        match self {
            BackgroundColor::Red => "red",
            BackgroundColor::Blue => "blue",
            BackgroundColor::White => "white",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        BackgroundColor::ALL.into_iter().find(|color| color.code() == code)
    }

    pub fn label(self) -> &'static str {
        match self {
            BackgroundColor::Red => "Red",
            BackgroundColor::Blue => "Blue",
            BackgroundColor::White => "White",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Costume {
    WhiteShirt,
    BlackSuit,
}

impl Costume {
    pub const ALL: [Costume; 2] = [Costume::WhiteShirt, Costume::BlackSuit];

    pub fn code(self) -> &'static str {
        match self {
            Costume::WhiteShirt => "white_shirt",
            Costume::BlackSuit => "black_suit",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Costume::ALL.into_iter().find(|costume| costume.code() == code)
    }

    pub fn label(self) -> &'static str {
        match self {
            Costume::WhiteShirt => "White shirt",
            Costume::BlackSuit => "Black suit",
        }
    }
}

/// Cosmetic edits applied so far; `None` means the photo is unedited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EditChoices {
    pub background: Option<BackgroundColor>,
    pub costume: Option<Costume>,
}

impl EditChoices {
    pub fn background_label(&self) -> &'static str {
        self.background.map(BackgroundColor::label).unwrap_or("Original")
    }

    pub fn costume_label(&self) -> &'static str {
        self.costume.map(Costume::label).unwrap_or("Original")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderConfig {
    pub kind: OrderKind,
    pub size: &'static str,
    pub quantity: u32,
    pub finish: Finish,
    pub edits: EditChoices,
}

impl OrderConfig {
    pub fn new(edits: EditChoices) -> Self {
        let kind = OrderKind::Print;
        Self {
            kind,
            size: kind.default_size().id,
            quantity: 1,
            finish: Finish::default(),
            edits,
        }
    }

    pub fn apply(&mut self, change: OrderChange) -> Result<(), OrderError> {
        match change {
            OrderChange::Kind(kind) => {
                self.kind = kind;
                self.size = kind.default_size().id;
                self.quantity = 1;
            }
            OrderChange::Size(size) => {
                let option = self.kind.find_size(&size).ok_or(OrderError::UnknownSize {
                    kind: self.kind,
                    size,
                })?;
                self.size = option.id;
            }
            OrderChange::Quantity(delta) => {
                let next = i64::from(self.quantity) + i64::from(delta);
                self.quantity = u32::try_from(next.max(1)).unwrap_or(u32::MAX);
            }
            OrderChange::Finish(finish) => self.finish = finish,
        }
        Ok(())
    }

    pub fn size_option(&self) -> Result<&'static SizeOption, OrderError> {
        self.kind
            .find_size(self.size)
            .ok_or_else(|| OrderError::UnknownSize {
                kind: self.kind,
                size: self.size.to_string(),
            })
    }

    pub fn quote(&self) -> Result<Quote, OrderError> {
        let option = self.size_option()?;
        Ok(Quote {
            unit_price: option.price,
            quantity: self.quantity,
            total: option.price * u64::from(self.quantity),
            quantity_unit: self.kind.quantity_unit(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderChange {
    Kind(OrderKind),
    Size(String),
    Quantity(i32),
    Finish(Finish),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub unit_price: u64,
    pub quantity: u32,
    pub total: u64,
    pub quantity_unit: &'static str,
}

impl Quote {
    pub fn price_label(&self) -> String {
        format!("Price per {}", self.quantity_unit)
    }

    pub fn quantity_label(&self) -> String {
        let plural = if self.quantity == 1 { "" } else { "s" };
        format!("{} {}{}", self.quantity, self.quantity_unit, plural)
    }
}

/// Indonesian Rupiah with dot thousands separators and a plain space after the
/// symbol: `Rp 10.500`.
pub fn format_rupiah(amount: u64) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    format!("Rp {grouped}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub chat_id: i64,
    pub user_id: Option<i64>,
    pub display_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedOrder {
    pub config: OrderConfig,
    pub quote: Quote,
    pub customer: Customer,
}

/// Human-readable hand-off sent to the order recipient.
pub fn order_message(order: &PlacedOrder) -> Result<String, OrderError> {
    let config = &order.config;
    let option = config.size_option()?;
    let quote = &order.quote;

    let mut lines = vec![
        format!("New order: {}", config.kind.label()),
        format!("Size: {}", option.label),
        format!("Quantity: {}", quote.quantity_label()),
        format!("Finish: {}", config.finish.label()),
    ];
    if config.edits.background.is_some() {
        lines.push(format!("Background: {}", config.edits.background_label()));
    }
    if config.edits.costume.is_some() {
        lines.push(format!("Costume: {}", config.edits.costume_label()));
    }
    lines.push(format!(
        "{}: {}",
        quote.price_label(),
        format_rupiah(quote.unit_price)
    ));
    lines.push(format!("Total: {}", format_rupiah(quote.total)));

    let customer = &order.customer;
    let handle = customer
        .username
        .as_deref()
        .map(|username| format!(" (@{username})"))
        .unwrap_or_default();
    lines.push(format!(
        "Customer: {}{} [chat {}]",
        customer.display_name, handle, customer.chat_id
    ));

    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer() -> Customer {
        Customer {
            chat_id: 42,
            user_id: Some(7),
            display_name: "Sari Dewi".to_string(),
            username: Some("sari".to_string()),
        }
    }

    #[test]
    fn print_4r_times_three_costs_10500() {
        let mut config = OrderConfig::new(EditChoices::default());
        assert_eq!(config.size, "4R");
        config.apply(OrderChange::Quantity(1)).unwrap();
        config.apply(OrderChange::Quantity(1)).unwrap();

        let quote = config.quote().unwrap();
        assert_eq!(quote.unit_price, 3500);
        assert_eq!(quote.quantity, 3);
        assert_eq!(quote.total, 10500);
    }

    #[test]
    fn id_photo_defaults_to_3x4_pack() {
        let mut config = OrderConfig::new(EditChoices::default());
        config.apply(OrderChange::Kind(OrderKind::IdPhoto)).unwrap();

        assert_eq!(config.size, "3x4");
        let quote = config.quote().unwrap();
        assert_eq!(quote.total, 10000);
        assert_eq!(quote.quantity_label(), "1 pack");
        assert_eq!(quote.price_label(), "Price per pack");
    }

    #[test]
    fn quantity_never_drops_below_one() {
        let mut config = OrderConfig::new(EditChoices::default());
        config.apply(OrderChange::Quantity(2)).unwrap();
        for _ in 0..10 {
            config.apply(OrderChange::Quantity(-1)).unwrap();
        }
        assert_eq!(config.quantity, 1);

        config.apply(OrderChange::Quantity(i32::MIN)).unwrap();
        assert_eq!(config.quantity, 1);
    }

    #[test]
    fn switching_kind_resets_size_and_quantity() {
        let mut config = OrderConfig::new(EditChoices::default());
        config.apply(OrderChange::Size("10R".into())).unwrap();
        config.apply(OrderChange::Quantity(4)).unwrap();

        config.apply(OrderChange::Kind(OrderKind::IdPhoto)).unwrap();
        assert_eq!((config.size, config.quantity), ("3x4", 1));

        config.apply(OrderChange::Quantity(2)).unwrap();
        config.apply(OrderChange::Kind(OrderKind::Print)).unwrap();
        assert_eq!((config.size, config.quantity), ("4R", 1));
    }

    #[test]
    fn rejects_sizes_from_the_other_catalog() {
        let mut config = OrderConfig::new(EditChoices::default());
        let err = config.apply(OrderChange::Size("3x4".into())).unwrap_err();
        assert_eq!(
            err,
            OrderError::UnknownSize {
                kind: OrderKind::Print,
                size: "3x4".into()
            }
        );
        assert_eq!(config.size, "4R");
    }

    #[test]
    fn total_is_unit_price_times_quantity_for_every_size() {
        for kind in OrderKind::ALL {
            for option in kind.catalog() {
                let mut config = OrderConfig::new(EditChoices::default());
                config.apply(OrderChange::Kind(kind)).unwrap();
                config.apply(OrderChange::Size(option.id.into())).unwrap();
                config.apply(OrderChange::Quantity(6)).unwrap();
                let quote = config.quote().unwrap();
                assert_eq!(quote.total, option.price * 7, "{}", option.id);
            }
        }
    }

    #[test]
    fn formats_rupiah_with_dot_grouping() {
        assert_eq!(format_rupiah(0), "Rp 0");
        assert_eq!(format_rupiah(950), "Rp 950");
        assert_eq!(format_rupiah(3500), "Rp 3.500");
        assert_eq!(format_rupiah(10500), "Rp 10.500");
        assert_eq!(format_rupiah(1250000), "Rp 1.250.000");
    }

    #[test]
    fn order_message_mentions_only_non_default_edits() {
        let mut config = OrderConfig::new(EditChoices {
            background: Some(BackgroundColor::Blue),
            costume: None,
        });
        config.apply(OrderChange::Finish(Finish::Glossy)).unwrap();
        config.apply(OrderChange::Quantity(2)).unwrap();
        let quote = config.quote().unwrap();
        let message = order_message(&PlacedOrder {
            config,
            quote,
            customer: customer(),
        })
        .unwrap();

        assert!(message.contains("New order: Photo print"));
        assert!(message.contains("Size: 4R (10.2x15.2 cm)"));
        assert!(message.contains("Quantity: 3 sheets"));
        assert!(message.contains("Finish: Glossy"));
        assert!(message.contains("Background: Blue"));
        assert!(!message.contains("Costume:"));
        assert!(message.contains("Total: Rp 10.500"));
        assert!(message.contains("Sari Dewi (@sari) [chat 42]"));
    }
}
