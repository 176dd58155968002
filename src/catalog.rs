use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::cart::{CartLine, CartLineParam};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamOption {
    pub label: String,
    #[serde(default)]
    pub price: u32,
    /// Included in the base price unless deselected.
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub label: String,
    /// Widget kind (`radios`, `checkboxes`, `select`). Not used for pricing.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub options: BTreeMap<String, ParamOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub params: BTreeMap<String, Param>,
}

/// Chosen option ids per param id.
pub type OrderForm = BTreeMap<String, BTreeSet<String>>;

impl Product {
    /// The form as first shown: every default option chosen.
    pub fn default_form(&self) -> OrderForm {
        self.params
            .iter()
            .map(|(param_id, param)| {
                let chosen = param
                    .options
                    .iter()
                    .filter(|(_, option)| option.default)
                    .map(|(option_id, _)| option_id.clone())
                    .collect();
                (param_id.clone(), chosen)
            })
            .collect()
    }

    fn is_chosen(form: &OrderForm, param_id: &str, option_id: &str) -> bool {
        form.get(param_id).is_some_and(|chosen| chosen.contains(option_id))
    }

    /// Price of one portion: extras add, removed defaults subtract.
    /// Ids in `form` that the product does not define are ignored.
    pub fn unit_price(&self, form: &OrderForm) -> u32 {
        let mut price = self.price;
        for (param_id, param) in &self.params {
            for (option_id, option) in &param.options {
                let chosen = Self::is_chosen(form, param_id, option_id);
                if chosen && !option.default {
                    price = price.saturating_add(option.price);
                } else if !chosen && option.default {
                    price = price.saturating_sub(option.price);
                }
            }
        }
        price
    }

    pub fn prepare_cart_line(&self, form: &OrderForm, amount: u32) -> CartLine {
        let price_single = self.unit_price(form);
        let params = self
            .params
            .iter()
            .map(|(param_id, param)| {
                let options = param
                    .options
                    .iter()
                    .filter(|(option_id, _)| Self::is_chosen(form, param_id, option_id))
                    .map(|(option_id, option)| (option_id.clone(), option.label.clone()))
                    .collect();
                let line_param = CartLineParam {
                    label: param.label.clone(),
                    options,
                };
                (param_id.clone(), line_param)
            })
            .collect();

        CartLine {
            id: self.id.clone(),
            name: self.name.clone(),
            amount,
            price_single,
            price: price_single.saturating_mul(amount),
            params,
        }
    }
}
