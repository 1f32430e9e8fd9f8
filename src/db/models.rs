use super::schema::{datasets, projects};
use crate::geometry::DatasetSpec;
use diesel::prelude::*;

#[derive(Identifiable, Queryable, Debug, PartialEq)]
pub struct Dataset {
    pub id: i32,
    pub name: String,
    pub ximagesize: i64,
    pub yimagesize: i64,
    pub startslice: i64,
    pub endslice: i64,
    pub zoomlevels: i32,
    pub zscale: f64,
    pub startwindow: i64,
    pub endwindow: i64,
}

impl Dataset {
    /// The raw parameters the geometry builder consumes.
    pub fn to_spec(&self) -> DatasetSpec {
        DatasetSpec {
            name: self.name.clone(),
            ximagesize: self.ximagesize as u64,
            yimagesize: self.yimagesize as u64,
            startslice: self.startslice as u64,
            endslice: self.endslice as u64,
            zoomlevels: self.zoomlevels as u8,
            zscale: self.zscale,
            startwindow: self.startwindow as u64,
            endwindow: self.endwindow as u64,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = datasets)]
pub struct NewDataset {
    pub name: String,
    pub ximagesize: i64,
    pub yimagesize: i64,
    pub startslice: i64,
    pub endslice: i64,
    pub zoomlevels: i32,
    pub zscale: f64,
    pub startwindow: i64,
    pub endwindow: i64,
}

#[derive(Identifiable, Queryable, Debug, PartialEq)]
pub struct Project {
    pub id: i32,
    pub token: String,
    pub dbname: String,
    pub backend: String,
    pub dataset: String,
    pub readonly: bool,
    pub exceptions: bool,
    pub resolution: i32,
}

#[derive(Insertable)]
#[diesel(table_name = projects)]
pub struct NewProject {
    pub token: String,
    pub dbname: String,
    pub backend: String,
    pub dataset: String,
    pub readonly: bool,
    pub exceptions: bool,
    pub resolution: i32,
}
