use super::{authed_api, FilterArgs};
use crate::browser::ListBrowser;
use crate::error::Result;
use crate::models::{Allocation, Asset, Client, Transaction};
use crate::settings::Settings;
use crate::views::{Entity, EntityView};

pub fn run(settings: &Settings, entity: Entity, filters: &FilterArgs) -> Result<()> {
    match entity {
        Entity::Clients => browse::<Client>(settings, filters),
        Entity::Assets => browse::<Asset>(settings, filters),
        Entity::Allocations => browse::<Allocation>(settings, filters),
        Entity::Transactions => browse::<Transaction>(settings, filters),
    }
}

fn browse<T: EntityView>(settings: &Settings, filters: &FilterArgs) -> Result<()> {
    let filters = filters.to_filters(T::FILTERS, T::TITLE)?;
    let api = authed_api(settings)?;
    let mut browser = ListBrowser::<T>::new(settings).with_filters(filters);
    browser.run(&api)
}
