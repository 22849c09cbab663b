pub mod base_model;
pub mod iforest;
pub mod knn;
pub mod loda;
pub mod lscp;
