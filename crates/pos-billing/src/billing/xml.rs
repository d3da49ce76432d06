//! Voucher XML in the layouts published by the SRI (`factura` 1.0.0, `notaCredito` 1.1.0).

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use rust_decimal::Decimal;

use super::access_key::AccessKey;
use super::document::{CreditNote, DocumentHeader, Invoice};
use super::totals::{round_money, DocumentTotals, LineItem};
use crate::catalog::choices::VAT_TAX_CODE;
use crate::catalog::{Company, Customer};

/// Element writer over [`quick_xml::Writer`]; text nodes and attribute values are escaped by
/// quick-xml.
pub(crate) struct XmlWriter {
    inner: Writer<Vec<u8>>,
    open: Vec<&'static str>,
}

impl XmlWriter {
    pub(crate) fn new() -> quick_xml::Result<Self> {
        let mut inner = Writer::new(Vec::new());
        inner.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        Ok(Self {
            inner,
            open: Vec::new(),
        })
    }

    fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> quick_xml::Result<()> {
        let element = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.inner.write_event(Event::Start(element))
    }

    fn end(&mut self, name: &str) -> quick_xml::Result<()> {
        self.inner.write_event(Event::End(BytesEnd::new(name)))
    }

    pub(crate) fn open(
        &mut self,
        name: &'static str,
        attrs: &[(&str, &str)],
    ) -> quick_xml::Result<&mut Self> {
        self.start(name, attrs)?;
        self.open.push(name);
        Ok(self)
    }

    pub(crate) fn close(&mut self) -> quick_xml::Result<&mut Self> {
        if let Some(name) = self.open.pop() {
            self.end(name)?;
        }
        Ok(self)
    }

    pub(crate) fn leaf_with(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
        text: &str,
    ) -> quick_xml::Result<&mut Self> {
        self.start(name, attrs)?;
        self.inner.write_event(Event::Text(BytesText::new(text)))?;
        self.end(name)?;
        Ok(self)
    }

    pub(crate) fn leaf(&mut self, name: &str, text: &str) -> quick_xml::Result<&mut Self> {
        self.leaf_with(name, &[], text)
    }

    pub(crate) fn finish(mut self) -> quick_xml::Result<String> {
        while !self.open.is_empty() {
            self.close()?;
        }
        Ok(String::from_utf8(self.inner.into_inner())?)
    }
}

fn money(value: Decimal) -> String {
    format!("{:.2}", round_money(value))
}

fn quantity(value: i64) -> String {
    format!("{value}.00")
}

fn tax_info(
    xml: &mut XmlWriter,
    company: &Company,
    header: &DocumentHeader,
    key: &AccessKey,
) -> quick_xml::Result<()> {
    let number = header
        .receipt_number
        .map(|number| number.to_string())
        .unwrap_or_default();
    xml.open("infoTributaria", &[])?
        .leaf("ambiente", &header.environment.code().to_string())?
        .leaf("tipoEmision", &company.emission_type.code().to_string())?
        .leaf("razonSocial", &company.company_name)?
        .leaf("nombreComercial", &company.commercial_name)?
        .leaf("ruc", &company.ruc)?
        .leaf("claveAcceso", key.as_str())?
        .leaf("codDoc", header.voucher_type().code())?
        .leaf("estab", &header.receipt.establishment_code)?
        .leaf("ptoEmi", &header.receipt.issuing_point_code)?
        .leaf("secuencial", &number)?
        .leaf("dirMatriz", &company.main_address)?;
    if company.regime.is_rimpe() {
        xml.leaf("contribuyenteRimpe", company.regime.label())?;
    }
    if company.retention_agent {
        xml.leaf("agenteRetencion", "1")?;
    }
    xml.close()?;
    Ok(())
}

fn totals_with_taxes(
    xml: &mut XmlWriter,
    company: &Company,
    totals: &DocumentTotals,
) -> quick_xml::Result<()> {
    xml.open("totalConImpuestos", &[])?;
    if !totals.subtotal_without_tax.is_zero() {
        xml.open("totalImpuesto", &[])?
            .leaf("codigo", &VAT_TAX_CODE.to_string())?
            .leaf("codigoPorcentaje", "0")?
            .leaf("baseImponible", &money(totals.subtotal_without_tax))?
            .leaf("valor", "0.00")?
            .close()?;
    }
    if !totals.subtotal_with_tax.is_zero() {
        xml.open("totalImpuesto", &[])?
            .leaf("codigo", &VAT_TAX_CODE.to_string())?
            .leaf("codigoPorcentaje", &company.tax_percentage.code().to_string())?
            .leaf("baseImponible", &money(totals.subtotal_with_tax))?
            .leaf("valor", &money(totals.total_tax))?
            .close()?;
    }
    xml.close()?;
    Ok(())
}

fn details(
    xml: &mut XmlWriter,
    company: &Company,
    lines: &[LineItem],
    code_element: &'static str,
) -> quick_xml::Result<()> {
    xml.open("detalles", &[])?;
    for line in lines {
        xml.open("detalle", &[])?
            .leaf(code_element, &line.code)?
            .leaf("descripcion", &line.description)?
            .leaf("cantidad", &quantity(line.quantity))?
            .leaf("precioUnitario", &money(line.price))?
            .leaf("descuento", &money(line.total_discount))?
            .leaf("precioTotalSinImpuesto", &money(line.total_amount))?
            .open("impuestos", &[])?
            .open("impuesto", &[])?
            .leaf("codigo", &VAT_TAX_CODE.to_string())?;
        if line.has_tax {
            xml.leaf("codigoPorcentaje", &company.tax_percentage.code().to_string())?
                .leaf("tarifa", &money(line.tax_rate_percent()))?
                .leaf("baseImponible", &money(line.total_amount))?
                .leaf("valor", &money(line.total_tax))?;
        } else {
            xml.leaf("codigoPorcentaje", "0")?
                .leaf("tarifa", "0")?
                .leaf("baseImponible", &money(line.total_amount))?
                .leaf("valor", "0")?;
        }
        xml.close()?.close()?.close()?;
    }
    xml.close()?;
    Ok(())
}

fn additional_fields(xml: &mut XmlWriter, fields: &[(String, String)]) -> quick_xml::Result<()> {
    if fields.is_empty() {
        return Ok(());
    }
    xml.open("infoAdicional", &[])?;
    for (name, value) in fields {
        xml.leaf_with("campoAdicional", &[("nombre", name.as_str())], value)?;
    }
    xml.close()?;
    Ok(())
}

fn customer_fields(customer: &Customer) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    if let Some(address) = customer.address() {
        fields.push(("dirCliente".to_string(), address.to_string()));
    }
    if let Some(mobile) = customer.mobile() {
        fields.push(("telfCliente".to_string(), mobile.to_string()));
    }
    fields
}

pub fn render_invoice(
    company: &Company,
    customer: &Customer,
    invoice: &Invoice,
    key: &AccessKey,
) -> quick_xml::Result<String> {
    let header = &invoice.header;
    let totals = &invoice.totals;
    let mut xml = XmlWriter::new()?;
    xml.open("factura", &[("id", "comprobante"), ("version", "1.0.0")])?;
    tax_info(&mut xml, company, header, key)?;

    xml.open("infoFactura", &[])?
        .leaf("fechaEmision", &header.issue_date.format("%d/%m/%Y").to_string())?
        .leaf("dirEstablecimiento", &company.establishment_address)?;
    if company.has_special_taxpayer_resolution() {
        xml.leaf("contribuyenteEspecial", &company.special_taxpayer)?;
    }
    xml.leaf("obligadoContabilidad", company.obligated_accounting_label())?
        .leaf(
            "tipoIdentificacionComprador",
            customer.identification_type().code(),
        )?
        .leaf("razonSocialComprador", &customer.names)?
        .leaf("identificacionComprador", customer.identification())?;
    if let Some(address) = customer.address() {
        xml.leaf("direccionComprador", address)?;
    }
    xml.leaf("totalSinImpuestos", &money(totals.subtotal()))?
        .leaf("totalDescuento", &money(totals.total_discount))?;
    totals_with_taxes(&mut xml, company, totals)?;
    xml.leaf("propina", "0.00")?
        .leaf("importeTotal", &money(totals.total_amount))?
        .leaf("moneda", "DOLAR")?
        .open("pagos", &[])?
        .open("pago", &[])?
        .leaf("formaPago", invoice.payment_method.code())?
        .leaf("total", &money(totals.total_amount))?
        .leaf("plazo", &invoice.time_limit.to_string())?
        .leaf("unidadTiempo", "dias")?
        .close()?
        .close()?
        .close()?;

    details(&mut xml, company, &invoice.lines, "codigoPrincipal")?;

    let mut fields: Vec<(String, String)> = header
        .additional_info
        .iter()
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    for (name, value) in customer_fields(customer) {
        if !header.additional_info.contains_key(&name) {
            fields.push((name, value));
        }
    }
    additional_fields(&mut xml, &fields)?;
    xml.finish()
}

pub fn render_credit_note(
    company: &Company,
    customer: &Customer,
    invoice: &Invoice,
    note: &CreditNote,
    key: &AccessKey,
) -> quick_xml::Result<String> {
    let header = &note.header;
    let totals = &note.totals;
    let mut xml = XmlWriter::new()?;
    xml.open("notaCredito", &[("id", "comprobante"), ("version", "1.1.0")])?;
    tax_info(&mut xml, company, header, key)?;

    xml.open("infoNotaCredito", &[])?
        .leaf("fechaEmision", &header.issue_date.format("%d/%m/%Y").to_string())?
        .leaf("dirEstablecimiento", &company.establishment_address)?
        .leaf(
            "tipoIdentificacionComprador",
            customer.identification_type().code(),
        )?
        .leaf("razonSocialComprador", &customer.names)?
        .leaf("identificacionComprador", customer.identification())?;
    if company.has_special_taxpayer_resolution() {
        xml.leaf("contribuyenteEspecial", &company.special_taxpayer)?;
    }
    xml.leaf("obligadoContabilidad", company.obligated_accounting_label())?
        .leaf("codDocModificado", invoice.header.voucher_type().code())?
        .leaf(
            "numDocModificado",
            invoice.header.receipt_number_full.as_deref().unwrap_or_default(),
        )?
        .leaf(
            "fechaEmisionDocSustento",
            &invoice.header.issue_date.format("%d/%m/%Y").to_string(),
        )?
        .leaf("totalSinImpuestos", &money(totals.subtotal()))?
        .leaf("valorModificacion", &money(totals.total_amount))?
        .leaf("moneda", "DOLAR")?;
    totals_with_taxes(&mut xml, company, totals)?;
    xml.leaf("motivo", &note.motive)?.close()?;

    details(&mut xml, company, &note.lines, "codigoInterno")?;

    let mut fields = customer_fields(customer);
    let number = header
        .receipt_number
        .map(|number| number.to_string())
        .unwrap_or_default();
    fields.push(("Observacion".to_string(), format!("NOTA_CREDITO # {number}")));
    additional_fields(&mut xml, &fields)?;
    xml.finish()
}
