pub mod attachment;
pub mod customs_operation;
pub mod customs_operation_line;
pub mod department;
pub mod employee;
pub mod invoice;
pub mod invoice_line;
pub mod leave_type;
pub mod partner;
pub mod picking;
pub mod product;
pub mod purchase_order;
pub mod purchase_order_line;
pub mod sale_order;
pub mod sale_order_line;
pub mod sale_order_line_lot;
pub mod stock_lot;
pub mod stock_move;
pub mod stock_move_line;
pub mod subscription;
pub mod tax;
pub mod time_off;
