//! Conversion between observation frames and the NaN-filled vectors used by numeric code.

use std::collections::HashMap;

use polars::prelude::*;

/// Accumulates named `Float64` channels in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ChannelFrameBuilder {
    order: Vec<String>,
    columns: HashMap<String, Vec<Option<f64>>>,
}

impl ChannelFrameBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channels<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut builder = Self::new();
        for name in names {
            builder.ensure_channel(name.into());
        }
        builder
    }

    fn ensure_channel(&mut self, name: String) -> &mut Vec<Option<f64>> {
        if !self.columns.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.columns.entry(name).or_default()
    }

    pub fn push(&mut self, channel: &str, value: Option<f64>) {
        self.ensure_channel(channel.to_string()).push(value);
    }

    /// Sets a whole channel, mapping non-finite samples to null.
    pub fn insert_values(&mut self, channel: impl Into<String>, values: &[f64]) {
        let column = self.ensure_channel(channel.into());
        column.clear();
        column.extend(values.iter().map(|v| v.is_finite().then_some(*v)));
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.columns.contains_key(channel)
    }

    pub fn channel_names(&self) -> &[String] {
        &self.order
    }

    /// Drops channels that never received a valid sample.
    pub fn retain_observed(&mut self) {
        let columns = &self.columns;
        self.order.retain(|name| {
            columns
                .get(name)
                .map(|values| values.iter().any(Option::is_some))
                .unwrap_or(false)
        });
        let order = &self.order;
        self.columns.retain(|name, _| order.contains(name));
    }

    pub fn build(mut self) -> PolarsResult<DataFrame> {
        let mut cols: Vec<Column> = Vec::with_capacity(self.order.len());
        for name in &self.order {
            let values = self.columns.remove(name).unwrap_or_default();
            cols.push(Series::new(name.as_str().into(), values).into());
        }
        DataFrame::new(cols)
    }
}

/// Samples of a `Float64` channel with nulls as NaN.
pub fn channel_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<f64>> {
    let column = df.column(name)?.f64()?;
    Ok(column
        .into_iter()
        .map(|value| value.unwrap_or(f64::NAN))
        .collect())
}

pub fn channel_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect()
}
