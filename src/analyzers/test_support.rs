//! Record builders shared by the analyzer tests.

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};

use crate::schema::{Dataset, Record};

/// A sale line at noon in Cairo/Downtown for a generic product.
pub(crate) fn sale(order_id: &str, date: &str, total: f64) -> Record {
    let date_only = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
    let time_only = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
    Record {
        order_id: order_id.to_string(),
        date_time: date_only.and_time(time_only),
        date_only,
        time_only,
        city: "Cairo".to_string(),
        branch: "Downtown".to_string(),
        product_name: "Tea".to_string(),
        product_category: "Drinks".to_string(),
        quantity: Some(1.0),
        total: Some(total),
        hour: time_only.hour(),
        weekday: date_only.weekday(),
    }
}

pub(crate) trait SaleExt {
    fn at_time(self, time: &str) -> Self;
    fn in_city(self, city: &str, branch: &str) -> Self;
    fn of_product(self, name: &str, category: &str, quantity: f64) -> Self;
}

impl SaleExt for Record {
    fn at_time(mut self, time: &str) -> Self {
        self.time_only = NaiveTime::parse_from_str(time, "%H:%M:%S").unwrap();
        self.hour = self.time_only.hour();
        self.date_time = self.date_only.and_time(self.time_only);
        self
    }

    fn in_city(mut self, city: &str, branch: &str) -> Self {
        self.city = city.to_string();
        self.branch = branch.to_string();
        self
    }

    fn of_product(mut self, name: &str, category: &str, quantity: f64) -> Self {
        self.product_name = name.to_string();
        self.product_category = category.to_string();
        self.quantity = Some(quantity);
        self
    }
}

/// The three-line example: two lines of order 1 on Jan 1, one of order 2 on Jan 2.
pub(crate) fn two_day_dataset() -> Dataset {
    Dataset::new(vec![
        sale("1", "2024-01-01", 50.0),
        sale("1", "2024-01-01", 30.0),
        sale("2", "2024-01-02", 20.0),
    ])
}

/// A mixed dataset across two cities, several products, hours and days.
pub(crate) fn mixed_dataset() -> Dataset {
    Dataset::new(vec![
        sale("1", "2024-01-01", 40.0)
            .at_time("09:15:00")
            .of_product("Tea", "Drinks", 2.0),
        sale("1", "2024-01-01", 15.0)
            .at_time("09:15:00")
            .of_product("Cake", "Bakery", 1.0),
        sale("2", "2024-01-01", 60.0)
            .at_time("18:40:00")
            .in_city("Giza", "Pyramids")
            .of_product("Coffee", "Drinks", 3.0),
        sale("3", "2024-01-02", 25.0)
            .at_time("09:05:00")
            .in_city("Cairo", "Zamalek")
            .of_product("Tea", "Drinks", 1.0),
        sale("4", "2024-01-02", -10.0)
            .at_time("13:00:00")
            .in_city("Giza", "Pyramids")
            .of_product("Cake", "Bakery", 1.0),
        sale("5", "2024-01-03", 35.0)
            .at_time("18:00:00")
            .of_product("Sandwich", "Food", 2.0),
    ])
}
