pub mod interface_enumerator;
